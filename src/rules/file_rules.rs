use crate::error::{RepoWardenError, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct RawFileRules {
    #[serde(default)]
    file_dir: Vec<RawEntry>,
    #[serde(default)]
    file_name: Vec<RawEntry>,
    #[serde(default)]
    file_path: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "match")]
    match_: Option<String>,
    regex: Option<String>,
}

#[derive(Debug, Default)]
struct Bucket {
    matches: Vec<String>,
    regexes: Vec<Regex>,
}

impl Bucket {
    fn from_raw(entries: Vec<RawEntry>) -> Self {
        let mut bucket = Bucket::default();
        for entry in entries {
            if let Some(m) = entry.match_ {
                bucket.matches.push(m);
            }
            if let Some(pattern) = entry.regex {
                match Regex::new(&pattern) {
                    Ok(re) => bucket.regexes.push(re),
                    Err(e) => log::warn!("dropping invalid file-rule regex {pattern:?}: {e}"),
                }
            }
        }
        bucket
    }

    fn matches(&self, value: &str) -> bool {
        self.matches.iter().any(|m| m == value) || self.regexes.iter().any(|re| re.is_match(value))
    }
}

/// The six match/regex buckets used to decide whether a `.py` file should
/// be scanned, keyed by directory, filename, or full path.
#[derive(Debug, Default)]
pub struct FileRules {
    file_dir: Bucket,
    file_name: Bucket,
    file_path: Bucket,
}

impl FileRules {
    /// Default selection when no file-rules path is supplied: `setup.py`
    /// and `__init__.py` by name.
    pub fn defaults() -> Self {
        FileRules {
            file_dir: Bucket::default(),
            file_name: Bucket {
                matches: vec!["setup.py".to_string(), "__init__.py".to_string()],
                regexes: Vec::new(),
            },
            file_path: Bucket::default(),
        }
    }

    pub fn file_matches(&self, dir: &str, name: &str, path: &str) -> bool {
        self.file_dir.matches(dir) || self.file_name.matches(name) || self.file_path.matches(path)
    }
}

/// `None` path means "use defaults". A present path that fails to parse is
/// a fatal configuration error; an individual bad regex inside an otherwise
/// valid file is dropped with a warning.
pub fn load_file_rules(path: Option<&Path>) -> Result<FileRules> {
    let Some(path) = path else {
        return Ok(FileRules::defaults());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| RepoWardenError::Config(format!("cannot read file-rules {path:?}: {e}")))?;
    let raw: RawFileRules = serde_yaml::from_str(&content)?;

    Ok(FileRules {
        file_dir: Bucket::from_raw(raw.file_dir),
        file_name: Bucket::from_raw(raw.file_name),
        file_path: Bucket::from_raw(raw.file_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_setup_and_init() {
        let rules = FileRules::defaults();
        assert!(rules.file_matches("pkg", "setup.py", "pkg/setup.py"));
        assert!(rules.file_matches("pkg", "__init__.py", "pkg/__init__.py"));
        assert!(!rules.file_matches("pkg", "utils.py", "pkg/utils.py"));
    }
}
