use super::models::{ChangelogEntry, PopularityJson, ProjectJson, ReleaseJson};
use super::{extract_anchor_texts, json_is_not_found, version_from_tar_gz_filename, Outcome, RegistryClient, PEP691_ACCEPT};
use crate::error::{RepoWardenError, Result};
use chrono::{TimeZone, Utc};
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";
const TOP_PACKAGES_URL: &str = "https://hugovk.github.io/top-pypi-packages/top-pypi-packages-30-days.min.json";

/// The registry client for a PyPI-shaped package index: PEP 691/503 simple
/// API over HTTP, JSON metadata endpoints, and XML-RPC for the changelog
/// feed. Grounded in `monitor.py`'s `PypiMonitor` scraping methods, using
/// the same blocking-`reqwest` request-building idiom as this crate's other
/// HTTP call sites.
pub struct PypiRegistryClient {
    base: String,
    simple_base: String,
    project_json_template: String,
    release_json_template: String,
    http: reqwest::blocking::Client,
}

impl PypiRegistryClient {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("building the registry HTTP client");
        PypiRegistryClient {
            simple_base: format!("{base}/simple/"),
            project_json_template: format!("{base}/pypi/{{project}}/json"),
            release_json_template: format!("{base}/pypi/{{project}}/{{version}}/json"),
            base,
            http,
        }
    }

}

fn xmlrpc_value_to_i64(value: &xmlrpc::Value) -> Option<i64> {
    match value {
        xmlrpc::Value::Int(n) => Some(*n as i64),
        xmlrpc::Value::Int64(n) => Some(*n),
        _ => None,
    }
}

fn xmlrpc_value_to_str(value: &xmlrpc::Value) -> Option<&str> {
    match value {
        xmlrpc::Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

impl RegistryClient for PypiRegistryClient {
    fn list_projects(&self) -> Result<(u64, Vec<String>)> {
        let resp = self
            .http
            .get(&self.simple_base)
            .header("Connection", "close")
            .header("User-Agent", USER_AGENT)
            .header("Accept", PEP691_ACCEPT)
            .send()?;

        let serial = resp
            .headers()
            .get("X-PyPI-Last-Serial")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| RepoWardenError::Transient("simple index response missing X-PyPI-Last-Serial".into()))?;

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text()?;

        let names = if content_type.starts_with("application/vnd.pypi.simple.v1+json") {
            let parsed: super::models::SimpleIndexJson = serde_json::from_str(&body)?;
            parsed.projects.into_iter().map(|p| p.name).collect()
        } else {
            extract_anchor_texts(&body)
        };

        Ok((serial, names))
    }

    fn list_versions(&self, project: &str) -> Result<(u64, Vec<String>)> {
        let url = format!("{}{}", self.simple_base, project);
        let resp = self
            .http
            .get(&url)
            .header("Connection", "close")
            .header("User-Agent", USER_AGENT)
            .header("Accept", PEP691_ACCEPT)
            .send()?;

        let serial = resp
            .headers()
            .get("X-PyPI-Last-Serial")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text()?;

        let versions = if content_type.starts_with("application/vnd.pypi.simple.v1+json") {
            let parsed: super::models::SimpleProjectJson = serde_json::from_str(&body)?;
            parsed
                .files
                .into_iter()
                .filter(|f| f.filename.ends_with(".tar.gz"))
                .map(|f| version_from_tar_gz_filename(project, &f.filename))
                .collect()
        } else {
            extract_anchor_texts(&body)
                .into_iter()
                .filter(|name| name.ends_with(".tar.gz"))
                .map(|name| version_from_tar_gz_filename(project, &name))
                .collect()
        };

        Ok((serial, versions))
    }

    fn fetch_project(&self, project: &str) -> Result<Outcome<ProjectJson>> {
        let url = self.project_json_template.replace("{project}", project);
        let resp = self
            .http
            .get(&url)
            .header("Connection", "close")
            .header("User-Agent", USER_AGENT)
            .send()?;
        let body: serde_json::Value = resp.json()?;
        if json_is_not_found(&body) {
            Ok(Outcome::NotFound)
        } else {
            Ok(Outcome::Found(body))
        }
    }

    fn fetch_release(&self, project: &str, version: &str) -> Result<Outcome<ReleaseJson>> {
        let url = self
            .release_json_template
            .replace("{project}", project)
            .replace("{version}", version);
        let resp = self
            .http
            .get(&url)
            .header("Connection", "close")
            .header("User-Agent", USER_AGENT)
            .send()?;
        let body: serde_json::Value = resp.json()?;
        if json_is_not_found(&body) {
            Ok(Outcome::NotFound)
        } else {
            Ok(Outcome::Found(body))
        }
    }

    fn changelog_last_serial(&self) -> Result<u64> {
        let request = xmlrpc::Request::new("changelog_last_serial");
        let value = request
            .call_url(&self.base)
            .map_err(|e| RepoWardenError::Transient(format!("changelog_last_serial failed: {e}")))?;
        xmlrpc_value_to_i64(&value)
            .map(|n| n as u64)
            .ok_or_else(|| RepoWardenError::Transient("changelog_last_serial returned a non-integer".into()))
    }

    fn changelog_since(&self, serial: u64) -> Result<Vec<ChangelogEntry>> {
        let request = xmlrpc::Request::new("changelog_since_serial").arg(xmlrpc::Value::Int64(serial as i64));
        let value = request
            .call_url(&self.base)
            .map_err(|e| RepoWardenError::Transient(format!("changelog_since_serial failed: {e}")))?;
        let xmlrpc::Value::Array(rows) = value else {
            return Err(RepoWardenError::Transient("changelog_since_serial returned a non-array".into()));
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let xmlrpc::Value::Array(fields) = row else { continue };
            if fields.len() < 5 {
                continue;
            }
            let name = xmlrpc_value_to_str(&fields[0]).unwrap_or_default().to_string();
            let version = xmlrpc_value_to_str(&fields[1]).map(|s| s.to_string());
            let timestamp = xmlrpc_value_to_i64(&fields[2])
                .and_then(|t| Utc.timestamp_opt(t, 0).single())
                .unwrap_or_else(Utc::now);
            let action = xmlrpc_value_to_str(&fields[3]).unwrap_or_default().to_string();
            let serial = xmlrpc_value_to_i64(&fields[4]).unwrap_or(0) as u64;
            entries.push(ChangelogEntry { name, version, timestamp, action, serial });
        }
        Ok(entries)
    }

    fn fetch_popularity(&self) -> Result<PopularityJson> {
        let resp = self
            .http
            .get(TOP_PACKAGES_URL)
            .header("Connection", "close")
            .header("User-Agent", USER_AGENT)
            .send()?;
        let popularity: PopularityJson = resp.json()?;
        Ok(popularity)
    }
}
