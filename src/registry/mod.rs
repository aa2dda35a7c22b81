pub mod client;
pub mod models;

use crate::error::Result;
pub use client::PypiRegistryClient;
pub use models::{ChangelogEntry, PopularityJson, ProjectJson, ReleaseJson};

/// A distinguished "no such project/release" result, never an `Err` — the
/// registry answering "not found" is a normal outcome, not a failure of the
/// fetch itself (§4.1). A genuine network/parse failure is still surfaced
/// as `RepoWardenError::Transient`.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
}

impl<T> Outcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }
}

/// The registry's typed operation surface (C8). The monitor only ever sees
/// this trait, so a mocked client can drive the end-to-end scenarios in
/// tests without hitting the network.
pub trait RegistryClient: Send + Sync {
    fn list_projects(&self) -> Result<(u64, Vec<String>)>;
    fn list_versions(&self, project: &str) -> Result<(u64, Vec<String>)>;
    fn fetch_project(&self, project: &str) -> Result<Outcome<ProjectJson>>;
    fn fetch_release(&self, project: &str, version: &str) -> Result<Outcome<ReleaseJson>>;
    fn changelog_last_serial(&self) -> Result<u64>;
    fn changelog_since(&self, serial: u64) -> Result<Vec<ChangelogEntry>>;
    fn fetch_popularity(&self) -> Result<PopularityJson>;
}

/// Mirrors `json_is_not_found`: the registry signals a missing
/// project/release as a JSON object `{"message": "Not Found"}` rather than
/// a non-2xx status.
pub fn json_is_not_found(value: &serde_json::Value) -> bool {
    value.get("message").and_then(|m| m.as_str()) == Some("Not Found")
}

/// Extracts the version from a `{PROJECT}-{VERSION}.tar.gz` filename by
/// splitting on the last `-` before the suffix. `parse_version_from_tar_gz_filename`
/// in the original strips characters via `lstrip`/`rstrip` character-class
/// removal, which mis-parses whenever the project name shares characters
/// with the version prefix or the `.tar.gz` suffix; this is the robust
/// alternative the upstream design notes themselves recommend in place of
/// that literal behavior.
pub fn version_from_tar_gz_filename(_project: &str, filename: &str) -> String {
    let Some(stem) = filename.strip_suffix(".tar.gz") else {
        return String::new();
    };
    match stem.rsplit_once('-') {
        Some((_, version)) => version.to_string(),
        None => stem.to_string(),
    }
}

/// Extracts anchor text from a PEP 503 simple-index HTML listing, used as
/// the fallback when the registry answers with `text/html` instead of the
/// PEP 691 JSON content type. Uses the same tag-stripping regex idiom as
/// this crate's other scraped-text handling, generalized from comment
/// bodies to anchor text.
pub fn extract_anchor_texts(html: &str) -> Vec<String> {
    use regex::Regex;
    use std::sync::LazyLock;

    static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<a [^>]*>(.*?)</a>").unwrap());
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

    ANCHOR_RE
        .captures_iter(html)
        .map(|cap| {
            let raw = &cap[1];
            let text = TAG_RE.replace_all(raw, "");
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect()
}

pub const PEP691_ACCEPT: &str =
    "application/vnd.pypi.simple.v1+json, application/vnd.pypi.simple.v1+html;q=0.2, text/html;q=0.01";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_not_found_message() {
        let v = serde_json::json!({"message": "Not Found"});
        assert!(json_is_not_found(&v));
        let v2 = serde_json::json!({"info": {}});
        assert!(!json_is_not_found(&v2));
    }

    #[test]
    fn splits_version_on_last_dash_before_suffix() {
        assert_eq!(version_from_tar_gz_filename("requests", "requests-2.31.0.tar.gz"), "2.31.0");
        assert_eq!(version_from_tar_gz_filename("my-pkg", "my-pkg-1.0.tar.gz"), "1.0");
    }

    #[test]
    fn extracts_anchor_text_from_simple_index_html() {
        let html = r#"<a href="/simple/requests/">requests</a><a href="/simple/flask/">flask</a>"#;
        let names = extract_anchor_texts(html);
        assert_eq!(names, vec!["requests".to_string(), "flask".to_string()]);
    }
}
