pub mod memory;
pub mod models;

use chrono::{DateTime, Utc};
pub use models::*;

/// The metadata store's typed operation surface. The core (monitor,
/// scorer, scanner façade) only ever sees this trait; a real networked
/// backend could implement it without touching any other module.
pub trait MetadataStore: Send + Sync {
    fn insert_project(&self, project: Project);
    fn update_project(&self, project: Project);
    fn find_project_by_name(&self, name: &str, removed: bool) -> Option<Project>;
    fn set_project_removed(&self, name: &str, serial: u64, timestamp: DateTime<Utc>);
    fn set_project_releases_removed(&self, name: &str, serial: u64, timestamp: DateTime<Utc>);

    fn add_project_owner(&self, name: &str, owner: &str);
    fn remove_project_owner(&self, name: &str, owner: &str);
    fn change_project_owner_to_maintainer(&self, name: &str, user: &str);
    fn add_project_maintainer(&self, name: &str, maintainer: &str);
    fn remove_project_maintainer(&self, name: &str, maintainer: &str);
    fn change_project_maintainer_to_owner(&self, name: &str, user: &str);

    fn insert_release(&self, release: Release);
    fn find_release(&self, name: &str, version: &str) -> Option<Release>;
    fn set_release_removed(&self, name: &str, version: &str, serial: u64, timestamp: DateTime<Utc>);
    fn set_release_analyzed(&self, name: &str, version: &str, filename: &str);

    fn find_result_by_filename(&self, filename: &str) -> Option<ScanResult>;
    fn update_result(&self, result: ScanResult);

    fn insert_alias(&self, alias: Alias);
    fn find_alias_by_import_name(&self, import_name: &str) -> Option<Alias>;

    fn max_serial(&self) -> Option<u64>;
    fn insert_serial(&self, serial: u64);

    fn latest_popular(&self) -> Option<PopularSnapshot>;
    fn insert_popular(&self, snapshot: PopularSnapshot);

    fn find_private_by_name(&self, name: &str) -> Option<PrivateName>;
    fn upsert_private(&self, name: PrivateName);
}
