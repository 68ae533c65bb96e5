// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Task/phase outcomes have their own closed error types in
//! [`crate::engine`]; this enum covers everything around them (config,
//! watching, IO).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SympackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("package.json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SympackError>;
