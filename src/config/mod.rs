// src/config/mod.rs

//! Configuration loading and validation for sympack.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load the shared file and the machine-local overlay (`loader.rs`).
//! - Validate and merge them (`validate.rs`).
//! - Keep the overlay git-ignored (`gitignore.rs`).
//!
//! Interactive collection of missing values is not done here; a missing or
//! invalid file is reported as [`crate::errors::SympackError::ConfigError`].

pub mod gitignore;
pub mod loader;
pub mod model;
pub mod validate;

/// Shared, committed config file name.
pub const CONFIG_FILE: &str = "Sympack.toml";

/// Machine-local overlay file name.
pub const LOCAL_CONFIG_FILE: &str = "Sympack.local.toml";

pub use loader::{config_root_dir, load_and_validate, load_from_path, load_local_from_path};
pub use model::{
    ConfigFile, InstallSection, InstallSettings, LocalInstallSection, LocalProjectConfig,
    ProjectConfig, RawConfigFile, RawLocalConfigFile, WatchSection,
};
pub use validate::validate_config;
