use super::MonitorController;
use crate::error::Result;
use crate::registry::{json_is_not_found, ChangelogEntry, Outcome};
use regex::Regex;
use std::sync::LazyLock;

static FILE_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:remove|add\s+\S+)\s+file\s+(\S+)").unwrap());
static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:add|invite|accepted|remove|change)\s+Owner\s+(\S+)").unwrap());
static MAINTAINER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:add|invite|accepted|remove|change)\s+Maintainer\s+(\S+)").unwrap());

/// Fetches and replays the changelog slice since the local serial.
/// Mirrors `PypiMonitor.update`/`handle_changelog`.
pub fn run(controller: &MonitorController) -> Result<()> {
    let local_serial = controller.local_serial.lock().expect("local_serial mutex poisoned").expect("incremental mode requires a local serial");
    let remote = controller.registry.changelog_last_serial()?;

    if remote <= local_serial {
        return Ok(());
    }

    log::info!("local serial: {local_serial}, pypi serial: {remote}, begin to update");
    let changelog = controller.registry.changelog_since(local_serial)?;

    let mut previous: Option<(String, String)> = None;
    for activity in &changelog {
        if let Err(e) = handle_activity(controller, activity, &mut previous) {
            log::error!("monitor handle activity {activity:?} failed with: {e}");
        }
    }

    *controller.local_serial.lock().expect("local_serial mutex poisoned") = Some(remote);
    controller.store.insert_serial(remote);
    log::info!("finished, local serial: {remote}");
    Ok(())
}

fn handle_activity(controller: &MonitorController, activity: &ChangelogEntry, previous: &mut Option<(String, String)>) -> Result<()> {
    let project_name = activity.name.as_str();
    let release_version = activity.version.clone().unwrap_or_default();
    let action = activity.action.as_str();

    if action == "create" {
        create_project(controller, project_name, activity.serial)?;
    } else if action == "remove project" {
        controller.store.set_project_removed(project_name, activity.serial, activity.timestamp);
        controller.store.set_project_releases_removed(project_name, activity.serial, activity.timestamp);
    } else if let Some(owner) = OWNER_RE.captures(action).map(|c| c[1].to_string()) {
        dispatch_owner_action(controller, action, project_name, &owner);
    } else if let Some(maintainer) = MAINTAINER_RE.captures(action).map(|c| c[1].to_string()) {
        dispatch_maintainer_action(controller, action, project_name, &maintainer);
    } else if action == "new release"
        || action.starts_with("yank release")
        || action.starts_with("unyank release")
        || (FILE_ACTION_RE.is_match(action) && previous.as_ref() != Some(&(project_name.to_string(), release_version.clone())))
    {
        refresh_project_and_release(controller, project_name, &release_version, activity.serial)?;
    } else if action == "remove release" {
        controller.store.set_release_removed(project_name, &release_version, activity.serial, activity.timestamp);
    } else {
        log::debug!("monitor doesn't support handling activity currently: {activity:?}");
    }

    *previous = Some((project_name.to_string(), release_version));
    Ok(())
}

fn create_project(controller: &MonitorController, project_name: &str, serial: u64) -> Result<()> {
    let metadata = match controller.registry.fetch_project(project_name)? {
        Outcome::Found(json) => json,
        Outcome::NotFound => {
            log::warn!("project metadata not found: {project_name}");
            return Ok(());
        }
    };
    if json_is_not_found(&metadata) {
        log::warn!("project metadata not found: {project_name}");
        return Ok(());
    }
    controller.build_and_insert_project(project_name, metadata, serial);
    Ok(())
}

fn dispatch_owner_action(controller: &MonitorController, action: &str, project_name: &str, owner: &str) {
    if action.starts_with("invite Owner") {
        return;
    }
    if action.starts_with("add Owner") || action.starts_with("accepted Owner") {
        controller.store.add_project_owner(project_name, owner);
    } else if action.starts_with("remove Owner") {
        controller.store.remove_project_owner(project_name, owner);
    } else if action.starts_with("change Owner") {
        controller.store.change_project_owner_to_maintainer(project_name, owner);
    }
}

fn dispatch_maintainer_action(controller: &MonitorController, action: &str, project_name: &str, maintainer: &str) {
    if action.starts_with("invite Maintainer") {
        return;
    }
    if action.starts_with("add Maintainer") || action.starts_with("accepted Maintainer") {
        controller.store.add_project_maintainer(project_name, maintainer);
    } else if action.starts_with("remove Maintainer") {
        controller.store.remove_project_maintainer(project_name, maintainer);
    } else if action.starts_with("change Maintainer") {
        controller.warn_change_maintainer_once();
        controller.store.change_project_maintainer_to_owner(project_name, maintainer);
    }
}

/// Re-fetches both the project and release metadata and re-enqueues the
/// release's files, used for `new release`/yank/unyank/first-file-activity.
fn refresh_project_and_release(controller: &MonitorController, project_name: &str, release_version: &str, serial: u64) -> Result<()> {
    let project_metadata = match controller.registry.fetch_project(project_name)? {
        Outcome::Found(json) => json,
        Outcome::NotFound => {
            log::warn!("project metadata not found: {project_name}");
            return Ok(());
        }
    };
    if json_is_not_found(&project_metadata) {
        log::warn!("project metadata not found: {project_name}");
        return Ok(());
    }
    controller.update_project_metadata(project_name, project_metadata, serial);

    let Some(project) = controller.store.find_project_by_name(project_name, false) else {
        log::error!("process and save project metadata {project_name} failed");
        return Ok(());
    };

    let release_metadata = match controller.registry.fetch_release(project_name, release_version)? {
        Outcome::Found(json) => json,
        Outcome::NotFound => {
            log::warn!("release metadata not found: {project_name} {release_version}");
            return Ok(());
        }
    };
    if json_is_not_found(&release_metadata) {
        log::warn!("release metadata not found: {project_name} {release_version}");
        return Ok(());
    }

    let files = super::files_from_release_json(&release_metadata);
    controller.insert_release_and_enqueue(
        project_name,
        release_version,
        release_metadata,
        files,
        project.suspicion,
        project.suspicion_info.clone(),
        serial,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_owner_name_from_action() {
        let caps = OWNER_RE.captures("add Owner alice").unwrap();
        assert_eq!(&caps[1], "alice");
    }

    #[test]
    fn extracts_filename_from_file_action() {
        let caps = FILE_ACTION_RE.captures("remove file pkg-1.0.tar.gz").unwrap();
        assert_eq!(&caps[1], "pkg-1.0.tar.gz");
    }
}
