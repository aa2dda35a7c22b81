use super::queue::{AnalysisTask, DownloadTask};
use super::MonitorController;
use crate::blob::BlobMetadata;
use crate::store::{Alias, Metrics as StoreMetrics, ScanResult};
use crate::taint::Issue;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

/// Spawns the downloader worker: a plain OS thread blocking on the
/// download queue's pop, per the concurrency design ("Workers are plain OS
/// threads; no cooperative scheduler is required").
pub fn spawn_downloader(controller: Arc<MonitorController>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        let task = controller.download_queue.pop();
        if let Err(e) = download_save_file(&controller, &task) {
            log::error!("download and save {task:?} failed with: {e}");
        }
    })
}

pub fn spawn_analyzer(controller: Arc<MonitorController>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        let task = controller.analysis_queue.pop();
        if let Err(e) = analyze_save_file(&controller, &task) {
            log::error!("analyze {task:?} failed with: {e}");
        }
    })
}

/// Downloads a release file if it isn't already in the blob store, then
/// decides whether it needs taint analysis. Mirrors `download_save_file`.
fn download_save_file(controller: &MonitorController, task: &DownloadTask) -> crate::error::Result<()> {
    let already_stored = controller.blob.exists(&task.filename);
    let mut local_path: Option<PathBuf> = None;

    if !already_stored {
        let path = fetch_to_scratch(controller, &task.url, &task.filename)?;
        let data = std::fs::read(&path)?;
        controller.blob.put(
            &task.filename,
            &data,
            BlobMetadata {
                project: task.project.clone(),
                version: task.version.clone(),
                filename: task.filename.clone(),
                sha256: task.sha256.clone(),
            },
        )?;
        local_path = Some(path);
    }

    let needs_analysis = controller.config.analyze_threshold > -1
        && task.suspicion as i32 >= controller.config.analyze_threshold
        && controller.config.file_type.accepts(&task.filename);

    if needs_analysis {
        let path = match local_path.take() {
            Some(p) => p,
            None => controller.blob.get(&task.filename, &controller.config.scratch_dir)?,
        };
        controller.analysis_queue.push(
            task.suspicion,
            AnalysisTask {
                suspicion: task.suspicion,
                project: task.project.clone(),
                version: task.version.clone(),
                local_path: path,
                filename: task.filename.clone(),
                url: task.url.clone(),
            },
        );
    } else if let Some(path) = local_path {
        let _ = std::fs::remove_file(path);
    }

    Ok(())
}

fn fetch_to_scratch(controller: &MonitorController, url: &str, filename: &str) -> crate::error::Result<PathBuf> {
    std::fs::create_dir_all(&controller.config.scratch_dir)?;
    let dest = unique_path(&controller.config.scratch_dir, filename);

    let client = reqwest::blocking::Client::builder().timeout(Duration::from_secs(120)).build()?;
    let resp = client.get(url).header("Connection", "close").header("User-Agent", USER_AGENT).send()?;
    let bytes = resp.bytes()?;

    let mut file = std::fs::File::create(&dest)?;
    file.write_all(&bytes)?;
    Ok(dest)
}

/// Appends `(1)`, `(2)`, ... before the extension when `dir/filename`
/// already exists, with double-extension awareness for `.tar.gz`.
/// Grounded in `get_available_filepath`.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = if let Some(s) = filename.strip_suffix(".tar.gz") {
        (s.to_string(), ".tar.gz".to_string())
    } else if let Some(dot) = filename.rfind('.') {
        (filename[..dot].to_string(), filename[dot..].to_string())
    } else {
        (filename.to_string(), String::new())
    };

    let mut i = 1;
    loop {
        let candidate = dir.join(format!("{stem}({i}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

/// Analyzes a downloaded file if it hasn't been analyzed before (or
/// `--cover` forces re-analysis), records the result and aliases, and
/// removes the local copy. Mirrors `analyze_save_file`.
fn analyze_save_file(controller: &MonitorController, task: &AnalysisTask) -> crate::error::Result<()> {
    let should_analyze = controller.config.cover || controller.store.find_result_by_filename(&task.filename).is_none();
    if !should_analyze {
        let _ = std::fs::remove_file(&task.local_path);
        return Ok(());
    }

    let outcome = crate::scanner::scan(&task.local_path, &controller.config.scratch_dir, &controller.rules, &controller.file_rules)?;

    let Some(outcome) = outcome else {
        let _ = std::fs::remove_file(&task.local_path);
        return Ok(());
    };

    if outcome.metrics.cnt > 0 {
        log::error!(
            "issues found in project: {} {}, filename: {}, count: {}",
            task.project,
            task.version,
            task.filename,
            outcome.metrics.cnt
        );
    }

    let issues: std::collections::HashMap<String, Vec<Issue>> = outcome
        .issues
        .into_iter()
        .map(|(path, issues)| (path.to_string_lossy().to_string(), issues))
        .collect();

    controller.store.update_result(ScanResult {
        project: task.project.clone(),
        version: task.version.clone(),
        filename: task.filename.clone(),
        url: task.url.clone(),
        analyzed_time: Utc::now(),
        import_name: outcome.import_name.clone(),
        scanned_files: outcome.scanned_files.iter().map(|p| p.to_string_lossy().to_string()).collect(),
        metrics: StoreMetrics {
            files: outcome.metrics.files,
            lines: outcome.metrics.lines,
            cnt: outcome.metrics.cnt,
            low: outcome.metrics.low,
            medium: outcome.metrics.medium,
            high: outcome.metrics.high,
        },
        issues,
    });

    controller.store.set_release_analyzed(&task.project, &task.version, &task.filename);

    for import_name in &outcome.import_name {
        if import_name != &task.project {
            controller.store.insert_alias(Alias {
                name: task.project.clone(),
                version: task.version.clone(),
                import_name: import_name.clone(),
            });
        }
    }

    let _ = std::fs::remove_file(&task.local_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_path_appends_counter_for_tar_gz() {
        let dir = std::env::temp_dir().join(format!("repowarden-worker-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pkg-1.0.tar.gz"), b"x").unwrap();

        let path = unique_path(&dir, "pkg-1.0.tar.gz");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "pkg-1.0(1).tar.gz");
    }
}
