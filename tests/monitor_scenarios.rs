use chrono::{TimeZone, Utc};
use repowarden::blob::BlobStore;
use repowarden::error::Result;
use repowarden::monitor::{bootstrap, incremental, MonitorConfig, MonitorController};
use repowarden::registry::{ChangelogEntry, Outcome, PopularityJson, ProjectJson, RegistryClient, ReleaseJson};
use repowarden::rules::{FileRules, RuleSet};
use repowarden::store::memory::InMemoryStore;
use repowarden::store::{MetadataStore, PopularSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A registry double driven entirely by canned, in-test data, standing in
/// for the changelog/index/release HTTP surface so the monitor scenarios
/// run without a network.
#[derive(Default)]
struct MockRegistry {
    project_list: (u64, Vec<String>),
    projects: Mutex<HashMap<String, serde_json::Value>>,
    versions: Mutex<HashMap<String, Vec<String>>>,
    releases: Mutex<HashMap<(String, String), serde_json::Value>>,
    changelog_last_serial: Mutex<u64>,
    changelog: Mutex<Vec<ChangelogEntry>>,
}

impl RegistryClient for MockRegistry {
    fn list_projects(&self) -> Result<(u64, Vec<String>)> {
        Ok(self.project_list.clone())
    }

    fn list_versions(&self, project: &str) -> Result<(u64, Vec<String>)> {
        let versions = self.versions.lock().unwrap().get(project).cloned().unwrap_or_default();
        Ok((0, versions))
    }

    fn fetch_project(&self, project: &str) -> Result<Outcome<ProjectJson>> {
        match self.projects.lock().unwrap().get(project).cloned() {
            Some(json) => Ok(Outcome::Found(json)),
            None => Ok(Outcome::NotFound),
        }
    }

    fn fetch_release(&self, project: &str, version: &str) -> Result<Outcome<ReleaseJson>> {
        match self.releases.lock().unwrap().get(&(project.to_string(), version.to_string())).cloned() {
            Some(json) => Ok(Outcome::Found(json)),
            None => Ok(Outcome::NotFound),
        }
    }

    fn changelog_last_serial(&self) -> Result<u64> {
        Ok(*self.changelog_last_serial.lock().unwrap())
    }

    fn changelog_since(&self, serial: u64) -> Result<Vec<ChangelogEntry>> {
        Ok(self.changelog.lock().unwrap().iter().filter(|c| c.serial > serial).cloned().collect())
    }

    fn fetch_popularity(&self) -> Result<PopularityJson> {
        Ok(PopularityJson { last_update: Utc::now(), rows: Vec::new() })
    }
}

struct NullBlobStore;

impl BlobStore for NullBlobStore {
    fn exists(&self, _filename: &str) -> bool {
        false
    }
    fn put(&self, _filename: &str, _data: &[u8], _metadata: repowarden::blob::BlobMetadata) -> Result<()> {
        Ok(())
    }
    fn get(&self, _filename: &str, _dest_dir: &Path) -> Result<PathBuf> {
        unimplemented!("scenarios below never pull from the blob store")
    }
}

fn controller(registry: MockRegistry) -> MonitorController {
    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryStore::new());
    let blob: Arc<dyn BlobStore> = Arc::new(NullBlobStore);
    let config = MonitorConfig {
        interval: Duration::from_secs(60),
        analyze_threshold: -1,
        file_type: repowarden::monitor::FileTypeFilter::TarGz,
        levenshtein_distance: 2,
        cover: false,
        scratch_dir: std::env::temp_dir().join("repowarden-monitor-scenarios"),
    };
    let controller = MonitorController::new(store, blob, Arc::new(registry), Arc::new(RuleSet::default()), Arc::new(FileRules::default()), config);
    // No popular-list rule in any of these scenarios needs a real download,
    // so an empty, already-fresh snapshot is enough to satisfy scoring.
    *controller.popular.lock().unwrap() = Some(PopularSnapshot { last_update: Utc::now(), rows: Vec::new() });
    controller
}

fn project_json(name: &str) -> serde_json::Value {
    serde_json::json!({"info": {"name": name}})
}

fn release_json_with_one_file(filename: &str) -> serde_json::Value {
    serde_json::json!({
        "urls": [
            {
                "filename": filename,
                "url": format!("https://files.pythonhosted.org/packages/{filename}"),
                "size": 1234,
                "upload_time_iso_8601": "2026-01-01T00:00:00Z",
                "digests": {"sha256": "deadbeef"}
            }
        ]
    })
}

/// Scenario 1: bootstrap a two-project registry, then tick again with an
/// unchanged remote serial and confirm no further writes happen.
#[test]
fn bootstrap_then_steady_state() {
    let registry = MockRegistry {
        project_list: (100, vec!["A".to_string(), "B".to_string()]),
        projects: Mutex::new(HashMap::from([("A".to_string(), project_json("A")), ("B".to_string(), project_json("B"))])),
        changelog_last_serial: Mutex::new(100),
        ..Default::default()
    };
    let controller = controller(registry);

    bootstrap::run(&controller).unwrap();
    assert_eq!(*controller.local_serial.lock().unwrap(), Some(100));
    assert!(controller.store.find_project_by_name("A", false).is_some());
    assert!(controller.store.find_project_by_name("B", false).is_some());

    incremental::run(&controller).unwrap();
    assert_eq!(*controller.local_serial.lock().unwrap(), Some(100), "a tick at an unchanged remote serial must not advance local_serial");
    assert!(controller.download_queue.is_empty(), "no releases exist, so nothing should have been enqueued");
}

/// Scenario 2: a `create` changelog entry followed by a `new release` entry
/// for the same project inserts the project once, inserts the release, and
/// enqueues exactly its one file.
#[test]
fn create_then_new_release() {
    let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let registry = MockRegistry {
        project_list: (100, Vec::new()),
        projects: Mutex::new(HashMap::from([("C".to_string(), project_json("C"))])),
        releases: Mutex::new(HashMap::from([(
            ("C".to_string(), "1.0".to_string()),
            release_json_with_one_file("C-1.0.tar.gz"),
        )])),
        changelog_last_serial: Mutex::new(102),
        changelog: Mutex::new(vec![
            ChangelogEntry { name: "C".to_string(), version: None, timestamp: t, action: "create".to_string(), serial: 101 },
            ChangelogEntry {
                name: "C".to_string(),
                version: Some("1.0".to_string()),
                timestamp: t,
                action: "new release".to_string(),
                serial: 102,
            },
        ]),
        ..Default::default()
    };
    let controller = controller(registry);
    *controller.local_serial.lock().unwrap() = Some(100);

    incremental::run(&controller).unwrap();

    assert_eq!(*controller.local_serial.lock().unwrap(), Some(102));
    assert!(controller.store.find_project_by_name("C", false).is_some());
    let release = controller.store.find_release("C", "1.0").expect("release C 1.0 must be inserted");
    assert_eq!(release.files.len(), 1);
    assert_eq!(controller.download_queue.len(), 1);
    let task = controller.download_queue.pop();
    assert_eq!(task.filename, "C-1.0.tar.gz");
}

/// Scenario 3: a `remove project` activity marks the project and every one
/// of its releases removed, sharing the same removal serial.
#[test]
fn remove_project_cascades_to_its_releases() {
    let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let registry = MockRegistry {
        project_list: (100, Vec::new()),
        changelog_last_serial: Mutex::new(150),
        changelog: Mutex::new(vec![ChangelogEntry {
            name: "D".to_string(),
            version: None,
            timestamp: t,
            action: "remove project".to_string(),
            serial: 150,
        }]),
        ..Default::default()
    };
    let controller = controller(registry);
    *controller.local_serial.lock().unwrap() = Some(100);

    controller.store.insert_project(repowarden::store::Project {
        name: "D".to_string(),
        metadata: project_json("D"),
        owners: Default::default(),
        maintainers: Default::default(),
        removed: false,
        removal: None,
        suspicion: 0,
        suspicion_info: Vec::new(),
        analyzed: false,
        last_serial: 100,
    });
    for version in ["1.0", "1.1"] {
        controller.store.insert_release(repowarden::store::Release {
            project: "D".to_string(),
            version: version.to_string(),
            metadata: serde_json::json!({}),
            files: Vec::new(),
            removed: false,
            removal: None,
            suspicion: 0,
            suspicion_info: Vec::new(),
            analyzed: false,
            analyzed_files: Default::default(),
            last_serial: 100,
        });
    }

    incremental::run(&controller).unwrap();

    let project = controller.store.find_project_by_name("D", true).expect("removed project must still be findable");
    assert!(project.removed);
    assert_eq!(project.removal.as_ref().unwrap().serial, 150);

    for version in ["1.0", "1.1"] {
        let release = controller.store.find_release("D", version).unwrap();
        assert!(release.removed, "release {version} must be removed alongside its project");
        assert_eq!(release.removal.as_ref().unwrap().serial, 150);
    }
}

/// Scenario 4: an owner/maintainer lifecycle — `add Owner X`, a no-op
/// `invite Owner Y`, `accepted Owner Y`, then `change Owner X` moves X to
/// maintainers, leaving owners holding only Y.
#[test]
fn owner_lifecycle_transitions() {
    let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let registry = MockRegistry {
        project_list: (100, Vec::new()),
        changelog_last_serial: Mutex::new(104),
        changelog: Mutex::new(vec![
            ChangelogEntry { name: "E".to_string(), version: None, timestamp: t, action: "add Owner X".to_string(), serial: 101 },
            ChangelogEntry { name: "E".to_string(), version: None, timestamp: t, action: "invite Owner Y".to_string(), serial: 102 },
            ChangelogEntry { name: "E".to_string(), version: None, timestamp: t, action: "accepted Owner Y".to_string(), serial: 103 },
            ChangelogEntry { name: "E".to_string(), version: None, timestamp: t, action: "change Owner X".to_string(), serial: 104 },
        ]),
        ..Default::default()
    };
    let controller = controller(registry);
    *controller.local_serial.lock().unwrap() = Some(100);

    controller.store.insert_project(repowarden::store::Project {
        name: "E".to_string(),
        metadata: project_json("E"),
        owners: Default::default(),
        maintainers: Default::default(),
        removed: false,
        removal: None,
        suspicion: 0,
        suspicion_info: Vec::new(),
        analyzed: false,
        last_serial: 100,
    });

    incremental::run(&controller).unwrap();

    let project = controller.store.find_project_by_name("E", false).unwrap();
    assert_eq!(project.owners, std::collections::HashSet::from(["Y".to_string()]));
    assert_eq!(project.maintainers, std::collections::HashSet::from(["X".to_string()]));
}

/// A tick whose changelog carries only file add/remove activities on the
/// same (project, version) as the previous activity coalesces into a
/// single release re-fetch, per the single-step-memory de-duplication rule.
#[test]
fn co_located_file_activities_coalesce_to_one_release_fetch() {
    let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let registry = MockRegistry {
        project_list: (100, Vec::new()),
        projects: Mutex::new(HashMap::from([("F".to_string(), project_json("F"))])),
        releases: Mutex::new(HashMap::from([(
            ("F".to_string(), "2.0".to_string()),
            release_json_with_one_file("F-2.0.tar.gz"),
        )])),
        changelog_last_serial: Mutex::new(103),
        changelog: Mutex::new(vec![
            ChangelogEntry {
                name: "F".to_string(),
                version: Some("2.0".to_string()),
                timestamp: t,
                action: "add py3 file F-2.0-py3-none-any.whl".to_string(),
                serial: 101,
            },
            ChangelogEntry {
                name: "F".to_string(),
                version: Some("2.0".to_string()),
                timestamp: t,
                action: "remove file F-2.0-py3-none-any.whl".to_string(),
                serial: 102,
            },
            ChangelogEntry {
                name: "F".to_string(),
                version: Some("2.0".to_string()),
                timestamp: t,
                action: "add py3 file F-2.0.tar.gz".to_string(),
                serial: 103,
            },
        ]),
        ..Default::default()
    };
    let controller = controller(registry);
    *controller.local_serial.lock().unwrap() = Some(100);

    incremental::run(&controller).unwrap();

    // Only the first file activity on (F, 2.0) triggers a release fetch;
    // the download queue therefore holds exactly the one file from that
    // single re-fetch, not three.
    assert_eq!(controller.download_queue.len(), 1);
}
