use thiserror::Error;

/// The error kinds named in the error handling design: configuration
/// failures are fatal at startup, the rest are caught and logged by the
/// caller that owns the retry/skip policy for that operation.
#[derive(Debug, Error)]
pub enum RepoWardenError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient fetch error: {0}")]
    Transient(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("rule descriptor error: {0}")]
    RuleDescriptor(String),
}

pub type Result<T> = std::result::Result<T, RepoWardenError>;

impl From<std::io::Error> for RepoWardenError {
    fn from(e: std::io::Error) -> Self {
        RepoWardenError::Transient(e.to_string())
    }
}

impl From<reqwest::Error> for RepoWardenError {
    fn from(e: reqwest::Error) -> Self {
        RepoWardenError::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for RepoWardenError {
    fn from(e: serde_json::Error) -> Self {
        RepoWardenError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for RepoWardenError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoWardenError::Config(e.to_string())
    }
}
