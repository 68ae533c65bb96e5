// src/config/validate.rs

use std::collections::HashSet;

use globset::Glob;

use crate::config::model::{
    ConfigFile, InstallSettings, ProjectConfig, RawConfigFile, RawLocalConfigFile,
    WatchSection,
};
use crate::config::{CONFIG_FILE, LOCAL_CONFIG_FILE};
use crate::errors::{Result, SympackError};
use crate::types::InstallScope;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SympackError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(raw, None)
    }
}

/// Validate the shared config, merge the optional machine-local overlay into
/// it and return the effective [`ConfigFile`].
pub fn validate_config(
    raw: RawConfigFile,
    local: Option<RawLocalConfigFile>,
) -> Result<ConfigFile> {
    validate_watch(&raw.watch)?;

    let install = raw.install.ok_or_else(|| {
        SympackError::ConfigError(format!("missing [install] section in {CONFIG_FILE}"))
    })?;

    let scope = install.scope.ok_or_else(|| {
        SympackError::ConfigError(format!("install.scope is required in {CONFIG_FILE}"))
    })?;

    let mut projects = install.projects;
    if scope == InstallScope::Local {
        validate_projects(&projects)?;
    }

    if let Some(local) = local {
        merge_local_overlay(&mut projects, local)?;
    }

    let settings = InstallSettings { scope, projects };
    ensure_active_projects_have_paths(&settings)?;

    Ok(ConfigFile::new_unchecked(raw.watch, settings))
}

fn validate_watch(watch: &WatchSection) -> Result<()> {
    if watch.paths.is_empty() {
        return Err(SympackError::ConfigError(format!(
            "watch.paths must be a non-empty array in {CONFIG_FILE}"
        )));
    }

    if watch.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(SympackError::ConfigError(format!(
            "watch.extensions must be a non-empty array in {CONFIG_FILE}"
        )));
    }

    for pattern in &watch.paths {
        Glob::new(pattern).map_err(|e| {
            SympackError::ConfigError(format!(
                "invalid watch.paths pattern '{pattern}' in {CONFIG_FILE}: {e}"
            ))
        })?;
    }

    Ok(())
}

fn validate_projects(projects: &[ProjectConfig]) -> Result<()> {
    if projects.is_empty() {
        return Err(SympackError::ConfigError(format!(
            "install.projects is missing and must be an array when install.scope is 'local' in {CONFIG_FILE}"
        )));
    }

    let mut seen = HashSet::new();
    for project in projects {
        if project.name.trim().is_empty() {
            return Err(SympackError::ConfigError(format!(
                "each project in install.projects must have a name in {CONFIG_FILE}"
            )));
        }
        if !seen.insert(project.name.as_str()) {
            return Err(SympackError::ConfigError(format!(
                "project '{}' is listed more than once in {CONFIG_FILE}",
                project.name
            )));
        }
    }

    Ok(())
}

/// Overlay machine-local fields (`path`, `skip_install`) onto the shared
/// project list, matching by name.
fn merge_local_overlay(
    projects: &mut [ProjectConfig],
    local: RawLocalConfigFile,
) -> Result<()> {
    let install = local.install.ok_or_else(|| {
        SympackError::ConfigError(format!("missing [install] section in {LOCAL_CONFIG_FILE}"))
    })?;

    for local_project in install.projects {
        if local_project.name.trim().is_empty() {
            return Err(SympackError::ConfigError(format!(
                "each project in install.projects must have a name in {LOCAL_CONFIG_FILE}"
            )));
        }
        let Some(path) = local_project.path else {
            return Err(SympackError::ConfigError(format!(
                "project '{}' must have a path in {LOCAL_CONFIG_FILE}",
                local_project.name
            )));
        };

        let target = projects
            .iter_mut()
            .find(|p| p.name == local_project.name)
            .ok_or_else(|| {
                SympackError::ConfigError(format!(
                    "project name \"{}\" in {LOCAL_CONFIG_FILE} does not exist in {CONFIG_FILE}",
                    local_project.name
                ))
            })?;

        target.path = Some(path);
        if let Some(skip) = local_project.skip_install {
            target.skip_install = skip;
        }
    }

    Ok(())
}

fn ensure_active_projects_have_paths(settings: &InstallSettings) -> Result<()> {
    for project in settings.active_projects() {
        if project.path.is_none() {
            return Err(SympackError::ConfigError(format!(
                "project '{}' has no path; set it in {LOCAL_CONFIG_FILE}",
                project.name
            )));
        }
    }
    Ok(())
}
