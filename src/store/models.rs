use crate::taint::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single file belonging to a release, as described by the registry's
/// simple-API `files[]` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub upload_time: Option<DateTime<Utc>>,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Removal {
    pub serial: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub metadata: serde_json::Value,
    pub owners: HashSet<String>,
    pub maintainers: HashSet<String>,
    pub removed: bool,
    pub removal: Option<Removal>,
    pub suspicion: u8,
    pub suspicion_info: Vec<String>,
    pub analyzed: bool,
    pub last_serial: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub project: String,
    pub version: String,
    pub metadata: serde_json::Value,
    pub files: Vec<FileDescriptor>,
    pub removed: bool,
    pub removal: Option<Removal>,
    pub suspicion: u8,
    pub suspicion_info: Vec<String>,
    pub analyzed: bool,
    pub analyzed_files: HashSet<String>,
    pub last_serial: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub files: u32,
    pub lines: u32,
    pub cnt: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub project: String,
    pub version: String,
    pub filename: String,
    pub url: String,
    pub analyzed_time: DateTime<Utc>,
    pub import_name: Vec<String>,
    pub scanned_files: Vec<String>,
    pub metrics: Metrics,
    pub issues: std::collections::HashMap<String, Vec<Issue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Alias {
    pub name: String,
    pub version: String,
    pub import_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularEntry {
    pub project: String,
    pub download_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularSnapshot {
    pub last_update: DateTime<Utc>,
    pub rows: Vec<PopularEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateName {
    pub name: String,
}
