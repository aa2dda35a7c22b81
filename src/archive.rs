use crate::error::{RepoWardenError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Strips both the `.gz` and `.tar` extensions from a `.tar.gz` filename,
/// matching `extract_tar_gz_to_dir`'s double `splitext`.
fn tar_gz_stem(filename: &str) -> String {
    let no_gz = filename.strip_suffix(".gz").unwrap_or(filename);
    let no_tar = no_gz.strip_suffix(".tar").unwrap_or(no_gz);
    no_tar.to_string()
}

fn whl_stem(filename: &str) -> String {
    filename.strip_suffix(".whl").unwrap_or(filename).to_string()
}

/// Extracts a `.tar.gz` archive into a freshly created subdirectory of
/// `scratch_root`, named after the archive's stem. On failure the partial
/// destination directory is removed.
pub fn extract_tar_gz(src: &Path, scratch_root: &Path) -> Result<PathBuf> {
    let filename = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RepoWardenError::Extraction(format!("invalid archive path {src:?}")))?;
    let dest = scratch_root.join(tar_gz_stem(filename));

    match extract_tar_gz_inner(src, &dest) {
        Ok(()) => Ok(dest),
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dest);
            Err(e)
        }
    }
}

fn extract_tar_gz_inner(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(src)?;
    let gz = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(gz);
    archive
        .unpack(dest)
        .map_err(|e| RepoWardenError::Extraction(format!("tar.gz extraction failed: {e}")))
}

/// Extracts a `.whl` (zip) archive into a freshly created subdirectory of
/// `scratch_root`, named after the archive's stem.
pub fn extract_whl(src: &Path, scratch_root: &Path) -> Result<PathBuf> {
    let filename = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RepoWardenError::Extraction(format!("invalid archive path {src:?}")))?;
    let dest = scratch_root.join(whl_stem(filename));

    match extract_whl_inner(src, &dest) {
        Ok(()) => Ok(dest),
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dest);
            Err(e)
        }
    }
}

fn extract_whl_inner(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(src)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| RepoWardenError::Extraction(format!("not a valid wheel archive: {e}")))?;
    archive
        .extract(dest)
        .map_err(|e| RepoWardenError::Extraction(format!("whl extraction failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_strip_double_extension() {
        assert_eq!(tar_gz_stem("requests-2.31.0.tar.gz"), "requests-2.31.0");
        assert_eq!(whl_stem("requests-2.31.0-py3-none-any.whl"), "requests-2.31.0-py3-none-any");
    }
}
