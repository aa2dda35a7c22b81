use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub project: String,
    pub version: String,
    pub filename: String,
    pub sha256: Option<String>,
}

/// Puts, gets, and checks existence of release artifacts, keyed by
/// filename. No real object-store endpoint exists in this exercise; this
/// trait is the stable seam a networked S3/MinIO-shaped backend would slot
/// behind without the monitor or scanner noticing.
pub trait BlobStore: Send + Sync {
    fn exists(&self, filename: &str) -> bool;
    fn put(&self, filename: &str, data: &[u8], metadata: BlobMetadata) -> Result<()>;
    fn get(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Content type for a release artifact, by extension.
pub fn content_type(filename: &str) -> &'static str {
    if filename.ends_with(".tar.gz") {
        "application/gzip"
    } else if filename.ends_with(".whl") {
        "application/x-wheel+zip"
    } else {
        "application/octet-stream"
    }
}

/// One directory per bucket, one file per key plus a JSON metadata sidecar.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let _ = std::fs::create_dir_all(&root);
        FsBlobStore { root }
    }

    fn data_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    fn meta_path(&self, filename: &str) -> PathBuf {
        self.root.join(format!("{filename}.meta.json"))
    }
}

impl BlobStore for FsBlobStore {
    fn exists(&self, filename: &str) -> bool {
        self.data_path(filename).exists()
    }

    fn put(&self, filename: &str, data: &[u8], metadata: BlobMetadata) -> Result<()> {
        std::fs::write(self.data_path(filename), data)?;
        let meta_json = serde_json::to_vec(&metadata)?;
        std::fs::write(self.meta_path(filename), meta_json)?;
        Ok(())
    }

    fn get(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let dest = dest_dir.join(filename);
        std::fs::copy(self.data_path(filename), &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type("requests-2.31.0.tar.gz"), "application/gzip");
        assert_eq!(content_type("requests-2.31.0-py3-none-any.whl"), "application/x-wheel+zip");
    }

    #[test]
    fn round_trips_through_filesystem() {
        let root = std::env::temp_dir().join(format!("repowarden-blob-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let store = FsBlobStore::new(&root);
        assert!(!store.exists("a.tar.gz"));
        store
            .put(
                "a.tar.gz",
                b"data",
                BlobMetadata { project: "a".into(), version: "1.0".into(), filename: "a.tar.gz".into(), sha256: None },
            )
            .unwrap();
        assert!(store.exists("a.tar.gz"));
        let dest_dir = root.join("out");
        let path = store.get("a.tar.gz", &dest_dir).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"data");
    }
}
