use crate::store::PopularEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw project/release metadata, kept as an untyped JSON value rather than
/// a fully modeled struct, mirroring the original `scrape_project_metadata`/
/// `scrape_release_metadata` returning the registry's own JSON verbatim —
/// the core only ever reads a handful of fields out of it (name, owners,
/// files) and stores the rest opaquely in `store::Project`/`Release`.
pub type ProjectJson = serde_json::Value;
pub type ReleaseJson = serde_json::Value;

/// One entry from the registry's changelog feed: `[name, version,
/// timestamp, action, serial]` over XML-RPC, unpacked into fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub name: String,
    pub version: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub serial: u64,
}

/// The monthly top-packages snapshot, mirroring `scrape_popular_list`'s
/// `{"last_update": ..., "rows": [{"project": ..., "download_count": ...}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityJson {
    pub last_update: DateTime<Utc>,
    pub rows: Vec<PopularEntry>,
}

/// A project name paired with the `_last-serial` the simple index reports
/// for it, from a PEP 691 JSON listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SimpleIndexEntry {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleIndexJson {
    pub projects: Vec<SimpleIndexEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleProjectFile {
    pub filename: String,
    pub url: String,
    pub size: Option<u64>,
    #[serde(default, rename = "upload-time")]
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hashes: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleProjectJson {
    pub files: Vec<SimpleProjectFile>,
}
