pub mod bootstrap;
pub mod incremental;
pub mod queue;
pub mod workers;

use crate::blob::BlobStore;
use crate::error::Result;
use crate::registry::RegistryClient;
use crate::rules::{FileRules, RuleSet};
use crate::scoring::suspicion::calculate_project_suspicion;
use crate::store::{FileDescriptor, MetadataStore, PopularSnapshot, Project, Release};
use chrono::Utc;
use queue::{AnalysisTask, DownloadTask, PriorityQueue};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Which artifact extensions get queued for analysis, per `--file_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTypeFilter {
    TarGz,
    Whl,
    Any,
}

impl FileTypeFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tgz" => Some(FileTypeFilter::TarGz),
            "whl" => Some(FileTypeFilter::Whl),
            "*" => Some(FileTypeFilter::Any),
            _ => None,
        }
    }

    fn accepts(self, filename: &str) -> bool {
        match self {
            FileTypeFilter::TarGz => filename.ends_with(".tar.gz"),
            FileTypeFilter::Whl => filename.ends_with(".whl"),
            FileTypeFilter::Any => true,
        }
    }
}

/// Static configuration for one monitor run, holding the CLI-surfaced
/// knobs (§6): analysis threshold, file-type filter, Levenshtein distance,
/// re-analysis override, and the poll interval.
pub struct MonitorConfig {
    pub interval: Duration,
    pub analyze_threshold: i32,
    pub file_type: FileTypeFilter,
    pub levenshtein_distance: usize,
    pub cover: bool,
    pub scratch_dir: PathBuf,
}

/// The controller's shared state: one instance is built at startup and
/// handed to the bootstrap/incremental passes and the two worker threads
/// behind `Arc`. `local_serial`/`popular` are owned by the controller
/// thread and read-only to workers, per the concurrency design.
pub struct MonitorController {
    pub store: Arc<dyn MetadataStore>,
    pub blob: Arc<dyn BlobStore>,
    pub registry: Arc<dyn RegistryClient>,
    pub rules: Arc<RuleSet>,
    pub file_rules: Arc<FileRules>,
    pub config: MonitorConfig,
    pub download_queue: Arc<PriorityQueue<DownloadTask>>,
    pub analysis_queue: Arc<PriorityQueue<AnalysisTask>>,
    pub local_serial: Mutex<Option<u64>>,
    pub popular: Mutex<Option<PopularSnapshot>>,
    change_maintainer_warned: std::sync::Once,
}

impl MonitorController {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blob: Arc<dyn BlobStore>,
        registry: Arc<dyn RegistryClient>,
        rules: Arc<RuleSet>,
        file_rules: Arc<FileRules>,
        config: MonitorConfig,
    ) -> Self {
        MonitorController {
            store,
            blob,
            registry,
            rules,
            file_rules,
            config,
            download_queue: Arc::new(PriorityQueue::new()),
            analysis_queue: Arc::new(PriorityQueue::new()),
            local_serial: Mutex::new(None),
            popular: Mutex::new(None),
            change_maintainer_warned: std::sync::Once::new(),
        }
    }

    /// Runs forever: spawns the downloader/analyzer worker threads once,
    /// then alternates bootstrap/incremental passes with the configured
    /// sleep. Mirrors `PypiMonitor.run`'s top-level loop.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        workers::spawn_downloader(Arc::clone(self));
        workers::spawn_analyzer(Arc::clone(self));

        {
            let mut serial = self.local_serial.lock().expect("local_serial mutex poisoned");
            *serial = self.store.max_serial();
        }

        loop {
            self.refresh_popular_if_needed();

            let is_bootstrap = self.local_serial.lock().expect("local_serial mutex poisoned").is_none();
            let outcome = if is_bootstrap { bootstrap::run(self) } else { incremental::run(self) };

            if let Err(e) = outcome {
                log::error!("monitor pass failed: {e}");
            }

            std::thread::sleep(self.config.interval);
        }
    }

    fn refresh_popular_if_needed(&self) {
        let needs_update = {
            let popular = self.popular.lock().expect("popular mutex poisoned");
            match popular.as_ref() {
                None => true,
                Some(snapshot) => popular_time_need_update(snapshot.last_update),
            }
        };
        if !needs_update {
            return;
        }

        if let Some(stored) = self.store.latest_popular() {
            if !popular_time_need_update(stored.last_update) {
                *self.popular.lock().expect("popular mutex poisoned") = Some(stored);
                return;
            }
        }

        match self.registry.fetch_popularity() {
            Ok(popularity) => {
                let snapshot = PopularSnapshot { last_update: popularity.last_update, rows: popularity.rows };
                self.store.insert_popular(snapshot.clone());
                *self.popular.lock().expect("popular mutex poisoned") = Some(snapshot);
            }
            Err(e) => log::error!("scrape popular list failed with: {e}"),
        }
    }

    /// Scores a project and attaches the resulting suspicion fields,
    /// mirroring `calculate_project_suspicion` plus the `Project` fields
    /// `process_save_project_metadata_init` fills in.
    fn score_project(&self, name: &str) -> (u8, Vec<String>) {
        let popular = self.popular.lock().expect("popular mutex poisoned");
        match popular.as_ref() {
            Some(snapshot) => {
                calculate_project_suspicion(self.store.as_ref(), name, snapshot, self.config.levenshtein_distance)
            }
            None => {
                log::error!("update popular failed, cannot score project {name}");
                (0, Vec::new())
            }
        }
    }

    pub(crate) fn build_and_insert_project(&self, name: &str, metadata: serde_json::Value, last_serial: u64) -> (u8, Vec<String>) {
        let (suspicion, suspicion_info) = self.score_project(name);
        self.store.insert_project(Project {
            name: name.to_string(),
            metadata,
            owners: Default::default(),
            maintainers: Default::default(),
            removed: false,
            removal: None,
            suspicion,
            suspicion_info: suspicion_info.clone(),
            analyzed: false,
            last_serial,
        });
        (suspicion, suspicion_info)
    }

    pub(crate) fn update_project_metadata(&self, name: &str, metadata: serde_json::Value, last_serial: u64) {
        if let Some(mut project) = self.store.find_project_by_name(name, false) {
            project.metadata = metadata;
            project.last_serial = last_serial;
            self.store.update_project(project);
        }
    }

    /// Inserts a release and enqueues its files for download, mirroring
    /// `process_save_release_metadata_init`.
    pub(crate) fn insert_release_and_enqueue(
        &self,
        project: &str,
        version: &str,
        metadata: serde_json::Value,
        files: Vec<FileDescriptor>,
        suspicion: u8,
        suspicion_info: Vec<String>,
        last_serial: u64,
    ) {
        for file in &files {
            self.download_queue.push(
                suspicion,
                DownloadTask {
                    suspicion,
                    project: project.to_string(),
                    version: version.to_string(),
                    filename: file.filename.clone(),
                    url: file.url.clone(),
                    sha256: file.sha256.clone(),
                },
            );
        }

        self.store.insert_release(Release {
            project: project.to_string(),
            version: version.to_string(),
            metadata,
            files,
            removed: false,
            removal: None,
            suspicion,
            suspicion_info,
            analyzed: false,
            analyzed_files: Default::default(),
            last_serial,
        });
    }

    pub(crate) fn warn_change_maintainer_once(&self) {
        self.change_maintainer_warned.call_once(|| {
            log::warn!(
                "observed a \"change Maintainer\" changelog action; treating it as moving the \
                 named user to owners (symmetric to \"change Owner\" moving to maintainers)"
            );
        });
    }
}

/// `popular_time_need_update`: stale whenever the snapshot's year-month
/// differs from the current one and today isn't the 1st (on the 1st the
/// upstream top-packages feed may not have rolled over yet).
pub fn popular_time_need_update(last_update: chrono::DateTime<Utc>) -> bool {
    let now = Utc::now();
    if last_update.year() == now.year() && last_update.month() == now.month() {
        return false;
    }
    now.day() > 1
}

use chrono::Datelike;

/// Parses the registry's release-files JSON (`urls: [...]`) into
/// `store::FileDescriptor`s, reading `filename`/`url`/`size`/`upload_time`/
/// `digests.sha256` off each entry.
pub fn files_from_release_json(release: &serde_json::Value) -> Vec<FileDescriptor> {
    let Some(urls) = release.get("urls").and_then(|u| u.as_array()) else {
        return Vec::new();
    };
    urls.iter()
        .filter_map(|u| {
            let filename = u.get("filename")?.as_str()?.to_string();
            let url = u.get("url")?.as_str()?.to_string();
            let size = u.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
            let upload_time = u
                .get("upload_time_iso_8601")
                .and_then(|t| t.as_str())
                .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc));
            let sha256 = u.get("digests").and_then(|d| d.get("sha256")).and_then(|s| s.as_str()).map(|s| s.to_string());
            Some(FileDescriptor { filename, url, size, upload_time, sha256 })
        })
        .collect()
}
