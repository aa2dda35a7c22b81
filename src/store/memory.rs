use super::models::*;
use super::MetadataStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store guarded by a single mutex. No real MongoDB server
/// exists in this exercise; this implementation realizes the same
/// uniqueness constraints (project name+removed, release name+version,
/// result filename, alias name+version+import_name, ...) with plain
/// `HashMap`s keyed by the leading field of each constraint.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    projects: HashMap<String, Vec<Project>>,
    releases: HashMap<(String, String), Vec<Release>>,
    results: HashMap<String, ScanResult>,
    aliases: Vec<Alias>,
    serials: Vec<u64>,
    popular: Vec<PopularSnapshot>,
    private: HashMap<String, PrivateName>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryStore {
    fn insert_project(&self, project: Project) {
        let mut inner = self.inner.lock().unwrap();
        inner.projects.entry(project.name.clone()).or_default().push(project);
    }

    fn update_project(&self, project: Project) {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner.projects.entry(project.name.clone()).or_default();
        if let Some(existing) = slot.iter_mut().find(|p| p.removed == project.removed) {
            *existing = project;
        } else {
            slot.push(project);
        }
    }

    fn find_project_by_name(&self, name: &str, removed: bool) -> Option<Project> {
        let inner = self.inner.lock().unwrap();
        inner
            .projects
            .get(name)
            .and_then(|versions| versions.iter().find(|p| p.removed == removed).cloned())
    }

    fn set_project_removed(&self, name: &str, serial: u64, timestamp: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(versions) = inner.projects.get_mut(name) {
            for project in versions.iter_mut().filter(|p| !p.removed) {
                project.removed = true;
                project.removal = Some(Removal { serial, timestamp });
            }
        }
    }

    fn set_project_releases_removed(&self, name: &str, serial: u64, timestamp: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        for ((project, _version), releases) in inner.releases.iter_mut() {
            if project == name {
                for release in releases.iter_mut().filter(|r| !r.removed) {
                    release.removed = true;
                    release.removal = Some(Removal { serial, timestamp });
                }
            }
        }
    }

    fn add_project_owner(&self, name: &str, owner: &str) {
        self.mutate_project(name, |p| {
            p.maintainers.remove(owner);
            p.owners.insert(owner.to_string());
        });
    }

    fn remove_project_owner(&self, name: &str, owner: &str) {
        self.mutate_project(name, |p| {
            p.owners.remove(owner);
        });
    }

    fn change_project_owner_to_maintainer(&self, name: &str, user: &str) {
        self.mutate_project(name, |p| {
            p.owners.remove(user);
            p.maintainers.insert(user.to_string());
        });
    }

    fn add_project_maintainer(&self, name: &str, maintainer: &str) {
        self.mutate_project(name, |p| {
            p.owners.remove(maintainer);
            p.maintainers.insert(maintainer.to_string());
        });
    }

    fn remove_project_maintainer(&self, name: &str, maintainer: &str) {
        self.mutate_project(name, |p| {
            p.maintainers.remove(maintainer);
        });
    }

    fn change_project_maintainer_to_owner(&self, name: &str, user: &str) {
        self.mutate_project(name, |p| {
            p.maintainers.remove(user);
            p.owners.insert(user.to_string());
        });
    }

    fn insert_release(&self, release: Release) {
        let mut inner = self.inner.lock().unwrap();
        let key = (release.project.clone(), release.version.clone());
        inner.releases.entry(key).or_default().push(release);
    }

    fn find_release(&self, name: &str, version: &str) -> Option<Release> {
        let inner = self.inner.lock().unwrap();
        inner
            .releases
            .get(&(name.to_string(), version.to_string()))
            .and_then(|rs| rs.iter().find(|r| !r.removed).cloned())
    }

    fn set_release_removed(&self, name: &str, version: &str, serial: u64, timestamp: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(releases) = inner.releases.get_mut(&(name.to_string(), version.to_string())) {
            for release in releases.iter_mut().filter(|r| !r.removed) {
                release.removed = true;
                release.removal = Some(Removal { serial, timestamp });
            }
        }
    }

    fn set_release_analyzed(&self, name: &str, version: &str, filename: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(releases) = inner.releases.get_mut(&(name.to_string(), version.to_string())) {
            for release in releases.iter_mut() {
                release.analyzed = true;
                release.analyzed_files.insert(filename.to_string());
            }
        }
    }

    fn find_result_by_filename(&self, filename: &str) -> Option<ScanResult> {
        let inner = self.inner.lock().unwrap();
        inner.results.get(filename).cloned()
    }

    fn update_result(&self, result: ScanResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.results.insert(result.filename.clone(), result);
    }

    fn insert_alias(&self, alias: Alias) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.aliases.contains(&alias) {
            inner.aliases.push(alias);
        }
    }

    fn find_alias_by_import_name(&self, import_name: &str) -> Option<Alias> {
        let inner = self.inner.lock().unwrap();
        inner
            .aliases
            .iter()
            .find(|a| a.import_name == import_name && a.name != import_name)
            .cloned()
    }

    fn max_serial(&self) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner.serials.iter().max().copied()
    }

    fn insert_serial(&self, serial: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.serials.push(serial);
    }

    fn latest_popular(&self) -> Option<PopularSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner.popular.iter().max_by_key(|p| p.last_update).cloned()
    }

    fn insert_popular(&self, snapshot: PopularSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner.popular.push(snapshot);
    }

    fn find_private_by_name(&self, name: &str) -> Option<PrivateName> {
        let inner = self.inner.lock().unwrap();
        inner.private.get(name).cloned()
    }

    fn upsert_private(&self, name: PrivateName) {
        let mut inner = self.inner.lock().unwrap();
        inner.private.insert(name.name.clone(), name);
    }
}

impl InMemoryStore {
    fn mutate_project(&self, name: &str, f: impl FnOnce(&mut Project)) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(versions) = inner.projects.get_mut(name) {
            if let Some(project) = versions.iter_mut().find(|p| !p.removed) {
                f(project);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            metadata: serde_json::Value::Null,
            owners: Default::default(),
            maintainers: Default::default(),
            removed: false,
            removal: None,
            suspicion: 0,
            suspicion_info: Vec::new(),
            analyzed: false,
            last_serial: 0,
        }
    }

    #[test]
    fn owner_and_maintainer_sets_stay_disjoint() {
        let store = InMemoryStore::new();
        store.insert_project(project("pkg"));
        store.add_project_owner("pkg", "alice");
        store.change_project_owner_to_maintainer("pkg", "alice");
        let p = store.find_project_by_name("pkg", false).unwrap();
        assert!(!p.owners.contains("alice"));
        assert!(p.maintainers.contains("alice"));
    }

    #[test]
    fn remove_project_marks_its_releases() {
        let store = InMemoryStore::new();
        store.insert_project(project("pkg"));
        store.insert_release(Release {
            project: "pkg".to_string(),
            version: "1.0".to_string(),
            metadata: serde_json::Value::Null,
            files: Vec::new(),
            removed: false,
            removal: None,
            suspicion: 0,
            suspicion_info: Vec::new(),
            analyzed: false,
            analyzed_files: Default::default(),
            last_serial: 0,
        });
        let now = Utc::now();
        store.set_project_removed("pkg", 150, now);
        store.set_project_releases_removed("pkg", 150, now);

        assert!(store.find_project_by_name("pkg", true).is_some());
        assert!(store.find_project_by_name("pkg", false).is_none());
        assert!(store.find_release("pkg", "1.0").is_none());
    }

    #[test]
    fn alias_lookup_excludes_self_named_project() {
        let store = InMemoryStore::new();
        store.insert_alias(Alias {
            name: "evil-pkg".to_string(),
            version: "1.0".to_string(),
            import_name: "requests".to_string(),
        });
        assert!(store.find_alias_by_import_name("requests").is_some());
        assert!(store.find_alias_by_import_name("evil-pkg").is_none());
    }
}
