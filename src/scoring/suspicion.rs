use crate::similarity::{detect_levenshtein, detect_permutation};
use crate::store::{MetadataStore, PopularSnapshot};

/// Scores a project name against the popular-packages snapshot and the
/// store's name-reuse/alias/private-name records. Each rule contributes
/// via `score = score.max(candidate)`; reasons accumulate for every rule
/// that fires, even ones that don't raise the running maximum.
///
/// `popular` is `None` only before the first successful popularity refresh;
/// callers are expected to have already handled that case (the original
/// treats it as a fatal startup condition, since the scorer cannot run at
/// all without a popularity baseline).
pub fn calculate_project_suspicion(
    store: &dyn MetadataStore,
    project_name: &str,
    popular: &PopularSnapshot,
    levenshtein_distance: usize,
) -> (u8, Vec<String>) {
    let mut score = 0u8;
    let mut reasons = Vec::new();

    for entry in &popular.rows {
        if entry.project == project_name {
            score = score.max(4);
            reasons.push(format!(
                "Popular Project: popular project {} downloaded {} times",
                entry.project, entry.download_count
            ));
            continue;
        }
        if detect_levenshtein(project_name, &entry.project, levenshtein_distance) {
            score = score.max(7);
            reasons.push(format!("Typosquatting: suspected to be typosquatting of project {}", entry.project));
        }
        if detect_permutation(project_name, &entry.project) {
            score = score.max(7);
            reasons.push(format!("Typosquatting: suspected to be typosquatting of project {}", entry.project));
        }
    }

    if let Some(alias) = store.find_alias_by_import_name(project_name) {
        score = score.max(10);
        reasons.push(format!(
            "Import-Name Hijacking: project name is same as the import name of project {}",
            alias.name
        ));
    }

    if store.find_project_by_name(project_name, true).is_some() {
        score = score.max(10);
        reasons.push(format!(
            "Project Use-After-Free: creating project with name {project_name}, a project with the same name was removed before"
        ));
    }

    if store.find_private_by_name(project_name).is_some() {
        score = score.max(10);
        reasons.push("Dependency Confusion: a project with the same name exists in private sources".to_string());
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::PopularEntry;
    use chrono::Utc;

    fn popular() -> PopularSnapshot {
        PopularSnapshot {
            last_update: Utc::now(),
            rows: vec![PopularEntry { project: "requests".to_string(), download_count: 9_000_000_000 }],
        }
    }

    #[test]
    fn typosquat_scores_seven() {
        let store = InMemoryStore::new();
        let (score, reasons) = calculate_project_suspicion(&store, "requsts", &popular(), 1);
        assert_eq!(score, 7);
        assert!(reasons.iter().any(|r| r.contains("Typosquatting")));
    }

    #[test]
    fn levenshtein_and_permutation_both_record_a_reason() {
        // "ailce" is a single transposition of "alice" (lev distance 2) and
        // also qualifies as a one-swap permutation of it: both rules fire
        // independently and each appends its own reason.
        let store = InMemoryStore::new();
        let popular = PopularSnapshot {
            last_update: Utc::now(),
            rows: vec![PopularEntry { project: "alice".to_string(), download_count: 1 }],
        };
        let (score, reasons) = calculate_project_suspicion(&store, "ailce", &popular, 2);
        assert_eq!(score, 7);
        assert_eq!(reasons.iter().filter(|r| r.contains("Typosquatting")).count(), 2);
    }

    #[test]
    fn exact_popular_match_scores_four() {
        let store = InMemoryStore::new();
        let (score, _) = calculate_project_suspicion(&store, "requests", &popular(), 1);
        assert_eq!(score, 4);
    }

    #[test]
    fn removed_project_reuse_scores_ten() {
        let store = InMemoryStore::new();
        store.insert_project(crate::store::Project {
            name: "evil".to_string(),
            metadata: serde_json::Value::Null,
            owners: Default::default(),
            maintainers: Default::default(),
            removed: true,
            removal: None,
            suspicion: 0,
            suspicion_info: Vec::new(),
            analyzed: false,
            last_serial: 0,
        });
        let (score, reasons) = calculate_project_suspicion(&store, "evil", &popular(), 1);
        assert_eq!(score, 10);
        assert!(reasons.iter().any(|r| r.contains("Use-After-Free")));
    }
}
