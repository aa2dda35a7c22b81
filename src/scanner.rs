use crate::archive;
use crate::error::Result;
use crate::rules::{FileRules, RuleSet};
use crate::taint::{self, Issue, SEVERITY_HIGH, SEVERITY_MEDIUM};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Per-severity-rank counts plus line/file totals, accumulated across every
/// `.py` file a scan touches. Mirrors `ScanResultMetrics`.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub files: u32,
    pub lines: u32,
    pub cnt: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Metrics {
    fn add_file(&mut self, lines: u32) {
        self.files += 1;
        self.lines += lines;
    }

    fn add_issues(&mut self, issues: &[Issue]) {
        self.cnt += issues.len() as u32;
        for issue in issues {
            match taint::rank_to_str(issue.severity) {
                "high" => self.high += 1,
                "medium" => self.medium += 1,
                _ => self.low += 1,
            }
        }
    }
}

/// The façade's full result payload, one per top-level `scan()` call.
/// Mirrors the fields `scan_local_dir`/`scan_local_file` assemble and
/// `store::ScanResult` persists.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub import_name: Vec<String>,
    pub scanned_files: Vec<PathBuf>,
    pub metrics: Metrics,
    pub issues: HashMap<PathBuf, Vec<Issue>>,
    pub total_time: Duration,
}

impl ScanOutcome {
    fn merge(&mut self, other: ScanOutcome) {
        self.import_name.extend(other.import_name);
        self.scanned_files.extend(other.scanned_files);
        self.metrics.files += other.metrics.files;
        self.metrics.lines += other.metrics.lines;
        self.metrics.cnt += other.metrics.cnt;
        self.metrics.low += other.metrics.low;
        self.metrics.medium += other.metrics.medium;
        self.metrics.high += other.metrics.high;
        self.issues.extend(other.issues);
    }
}

/// Scans a single local path, dispatching on its shape (§4.5 / C5):
/// `.tar.gz`/`.whl` are extracted into `scratch_root` and the extraction
/// scanned as a directory, with the scratch directory removed afterward
/// regardless of outcome; `.py` is analyzed directly; anything else is
/// treated as a directory. Extraction failure is logged and yields
/// `Ok(None)` rather than propagating, mirroring
/// `scan_local_tar_gz_file`/`scan_local_whl_file`'s exception handling.
pub fn scan(path: &Path, scratch_root: &Path, rules: &RuleSet, file_rules: &FileRules) -> Result<Option<ScanOutcome>> {
    let started = Instant::now();
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    if name.ends_with(".tar.gz") {
        return scan_archive(path, scratch_root, rules, file_rules, archive::extract_tar_gz, started);
    }
    if name.ends_with(".whl") {
        return scan_archive(path, scratch_root, rules, file_rules, archive::extract_whl, started);
    }
    if name.ends_with(".py") {
        let mut outcome = ScanOutcome::default();
        scan_local_py_file(path, rules, &mut outcome)?;
        outcome.total_time = started.elapsed();
        return Ok(Some(outcome));
    }

    let mut outcome = scan_local_dir(path, rules, file_rules)?;
    outcome.total_time = started.elapsed();
    Ok(Some(outcome))
}

fn scan_archive(
    src: &Path,
    scratch_root: &Path,
    rules: &RuleSet,
    file_rules: &FileRules,
    extract: fn(&Path, &Path) -> Result<PathBuf>,
    started: Instant,
) -> Result<Option<ScanOutcome>> {
    let dest = match extract(src, scratch_root) {
        Ok(dest) => dest,
        Err(e) => {
            log::warn!("extraction failed for {src:?}: {e}");
            return Ok(None);
        }
    };

    let result = scan_local_dir(&dest, rules, file_rules);
    let _ = std::fs::remove_dir_all(&dest);

    match result {
        Ok(mut outcome) => {
            outcome.total_time = started.elapsed();
            Ok(Some(outcome))
        }
        Err(e) => {
            log::warn!("scanning extracted archive {dest:?} failed: {e}");
            Ok(None)
        }
    }
}

/// Walks `dir` recursively, scanning every file the file-rules filter
/// accepts, and derives `import_name` from the directory layout along the
/// way. Mirrors `scan_local_dir` + `parse_import_name`.
pub fn scan_local_dir(dir: &Path, rules: &RuleSet, file_rules: &FileRules) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    let mut top_dir: Option<PathBuf> = None;
    walk_dir(dir, dir, rules, file_rules, &mut outcome, &mut top_dir)?;
    Ok(outcome)
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    rules: &RuleSet,
    file_rules: &FileRules,
    outcome: &mut ScanOutcome,
    top_dir: &mut Option<PathBuf>,
) -> Result<()> {
    if dir.join("__init__.py").is_file() {
        let is_subfolder = top_dir.as_ref().map(|t| dir.starts_with(t)).unwrap_or(false);
        if !is_subfolder {
            if let Some(basename) = dir.file_name().and_then(|n| n.to_str()) {
                outcome.import_name.push(basename.to_string());
            }
            *top_dir = Some(dir.to_path_buf());
        }
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot read directory {dir:?}: {e}");
            return Ok(());
        }
    };

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            subdirs.push(path);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        if !file_needs_scan(root, &path, file_rules) {
            continue;
        }

        scan_local_py_file(&path, rules, outcome)?;
    }

    for sub in subdirs {
        walk_dir(root, &sub, rules, file_rules, outcome, top_dir)?;
    }

    Ok(())
}

/// `_file_need_scan`: a file is only ever a candidate if it ends in `.py`;
/// the directory/filename/full-path buckets are then checked in that
/// order against `file_rules`.
fn file_needs_scan(root: &Path, path: &Path, file_rules: &FileRules) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !name.ends_with(".py") {
        return false;
    }
    let dir = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let full_path = path.strip_prefix(root).unwrap_or(path).to_string_lossy();
    file_rules.file_matches(dir, name, &full_path)
}

/// Reads, counts lines, parses, and taint-analyzes a single `.py` file,
/// folding its metrics and issues into `outcome`. Mirrors
/// `scan_local_py_file`.
fn scan_local_py_file(path: &Path, rules: &RuleSet, outcome: &mut ScanOutcome) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let lines = count_lines(&source);
    let filepath = path.to_string_lossy().to_string();

    let issues = match taint::analyze(&source, &filepath, rules) {
        Ok(issues) => issues,
        Err(e) => {
            log::warn!("parse error in {path:?}, skipping: {e}");
            outcome.metrics.add_file(lines);
            outcome.scanned_files.push(path.to_path_buf());
            return Ok(());
        }
    };

    outcome.metrics.add_file(lines);
    outcome.metrics.add_issues(&issues);
    outcome.scanned_files.push(path.to_path_buf());
    if !issues.is_empty() {
        outcome.issues.insert(path.to_path_buf(), issues);
    }
    Ok(())
}

/// `_parse_metrics`: a line counts if, trimmed, it is non-empty and does
/// not start with `#`. No tokenizer; block comments and multi-line
/// strings are not specially handled.
fn count_lines(source: &str) -> u32 {
    source
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .count() as u32
}

/// Classifies a rank number per §4.4: kept here for callers (store
/// persistence, CLI summaries) that only have a severity and need the
/// bucket name without pulling in the taint module directly.
pub fn severity_bucket(rank: u8) -> &'static str {
    if rank >= SEVERITY_HIGH {
        "high"
    } else if rank >= SEVERITY_MEDIUM {
        "medium"
    } else {
        "low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn tempdir() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("repowarden-scanner-test-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn counts_nonblank_noncomment_lines() {
        let src = "import os\n\n# a comment\n  \nos.system(x)\n";
        assert_eq!(count_lines(src), 2);
    }

    #[test]
    fn file_needs_scan_defaults_to_setup_and_init() {
        let rules = FileRules::defaults();
        let dir = tempdir();
        let setup = dir.join("setup.py");
        write_file(&setup, "");
        assert!(file_needs_scan(&dir, &setup, &rules));

        let other = dir.join("utils.py");
        write_file(&other, "");
        assert!(!file_needs_scan(&dir, &other, &rules));
    }

    #[test]
    fn import_name_skips_nested_subpackages() {
        let dir = tempdir();
        write_file(&dir.join("pkg").join("__init__.py"), "");
        write_file(&dir.join("pkg").join("sub").join("__init__.py"), "");
        write_file(&dir.join("pkg").join("setup.py"), "");

        let rules = RuleSet::default();
        let file_rules = FileRules::defaults();
        let outcome = scan_local_dir(&dir, &rules, &file_rules).unwrap();

        assert_eq!(outcome.import_name, vec!["pkg".to_string()]);
    }

    #[test]
    fn scans_a_single_py_file_directly() {
        let dir = tempdir();
        let path = dir.join("a.py");
        write_file(&path, "x = input()\nos.system(x)\n");

        let rules = RuleSet::default();
        let file_rules = FileRules::defaults();
        let outcome = scan(&path, &dir, &rules, &file_rules).unwrap().unwrap();

        assert_eq!(outcome.metrics.files, 1);
        assert_eq!(outcome.metrics.lines, 2);
        assert!(outcome.scanned_files.contains(&path));
    }
}
