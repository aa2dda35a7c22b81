use super::MonitorController;
use crate::error::Result;
use crate::registry::{json_is_not_found, Outcome};

/// Full crawl of the registry's project index, used when no local serial
/// is on record yet. Mirrors `scrape_save_all_projects_releases`.
pub fn run(controller: &MonitorController) -> Result<()> {
    let (pending_serial, projects) = controller.registry.list_projects()?;
    log::info!("bootstrap: pypi serial {pending_serial}, {} projects to scrape", projects.len());

    for project_name in &projects {
        if let Err(e) = scrape_project(controller, project_name, pending_serial) {
            log::error!("scrape and save metadata of project {project_name} failed with: {e}");
        }
    }

    *controller.local_serial.lock().expect("local_serial mutex poisoned") = Some(pending_serial);
    controller.store.insert_serial(pending_serial);
    log::info!("bootstrap finished, local serial: {pending_serial}");
    Ok(())
}

fn scrape_project(controller: &MonitorController, project_name: &str, serial: u64) -> Result<()> {
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

    let (suspicion, suspicion_info) = controller.build_and_insert_project(project_name, metadata, serial);

    let (_, versions) = controller.registry.list_versions(project_name)?;
    for version in versions {
        if let Err(e) = scrape_release(controller, project_name, &version, suspicion, &suspicion_info, serial) {
            log::error!("scrape and save metadata of release {project_name} {version} failed with: {e}");
        }
    }
    Ok(())
}

fn scrape_release(
    controller: &MonitorController,
    project_name: &str,
    version: &str,
    suspicion: u8,
    suspicion_info: &[String],
    serial: u64,
) -> Result<()> {
    let metadata = match controller.registry.fetch_release(project_name, version)? {
        Outcome::Found(json) => json,
        Outcome::NotFound => {
            log::warn!("release metadata not found: {project_name} {version}");
            return Ok(());
        }
    };
    if json_is_not_found(&metadata) {
        log::warn!("release metadata not found: {project_name} {version}");
        return Ok(());
    }

    let files = super::files_from_release_json(&metadata);
    controller.insert_release_and_enqueue(project_name, version, metadata, files, suspicion, suspicion_info.to_vec(), serial);
    Ok(())
}
