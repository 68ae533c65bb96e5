// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile, RawLocalConfigFile};
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load the shared config file and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the checked, merged configuration.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load the machine-local overlay, if it exists.
///
/// Relative project paths are resolved against the directory that contains
/// the overlay, so the file can be moved together with the package.
pub fn load_local_from_path(path: impl AsRef<Path>) -> Result<Option<RawLocalConfigFile>> {
    let path = path.as_ref();
    if !path.is_file() {
        debug!(?path, "no local config overlay");
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let mut config: RawLocalConfigFile = toml::from_str(&contents)?;

    let base = config_root_dir(path);
    if let Some(install) = config.install.as_mut() {
        for project in install.projects.iter_mut() {
            if let Some(p) = project.path.take() {
                project.path = Some(if p.is_relative() { base.join(p) } else { p });
            }
        }
    }

    Ok(Some(config))
}

/// Load shared config + optional overlay and validate the merged result.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(
    path: impl AsRef<Path>,
    local_path: impl AsRef<Path>,
) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    let local = load_local_from_path(&local_path)?;
    validate_config(raw, local)
}

/// Directory a config file lives in, falling back to the current directory
/// for bare file names.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

