// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::InstallScope;

/// Shared configuration as read from `Sympack.toml`.
///
/// ```toml
/// [watch]
/// paths = ["src/**"]
/// extensions = ["ts", "js"]
///
/// [install]
/// scope = "local"
///
/// [[install.projects]]
/// name = "app"
/// no_save = true
/// ```
///
/// This is the *unvalidated* shape. Use [`ConfigFile`] (obtained via
/// `TryFrom` or [`crate::config::validate_config`]) everywhere else.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    /// Missing entirely is a validation error, not a parse error, so that the
    /// message can name the file.
    #[serde(default)]
    pub install: Option<InstallSection>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Glob patterns (relative to the package root) to watch.
    #[serde(default = "default_watch_paths")]
    pub paths: Vec<String>,

    /// File extensions (without the dot) that count as source changes.
    #[serde(default = "default_watch_extensions")]
    pub extensions: Vec<String>,

    /// Quiet period after the last filesystem event before a change is
    /// reported.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Only report a change when the content of a watched file actually
    /// differs from what was last seen.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_watch_paths() -> Vec<String> {
    vec!["src/**".to_string()]
}

fn default_watch_extensions() -> Vec<String> {
    vec!["ts".to_string(), "js".to_string()]
}

fn default_debounce_ms() -> u64 {
    2000
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            paths: default_watch_paths(),
            extensions: default_watch_extensions(),
            debounce_ms: default_debounce_ms(),
            use_hash: false,
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstallSection {
    #[serde(default)]
    pub scope: Option<InstallScope>,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

/// One `[[install.projects]]` entry.
///
/// The shared file names projects and their install flags; the machine-local
/// overlay supplies `path` (and optionally `skip_install`).
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Pass `--no-save` so the project's `package.json` is left untouched.
    #[serde(default)]
    pub no_save: bool,

    /// Pass `--legacy-peer-deps`.
    #[serde(default)]
    pub has_peer_dependencies: bool,

    /// Keep the project in config but leave it out of install/cleanup.
    #[serde(default)]
    pub skip_install: bool,
}

/// Machine-local overlay as read from `Sympack.local.toml`.
///
/// ```toml
/// [[install.projects]]
/// name = "app"
/// path = "../app"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLocalConfigFile {
    #[serde(default)]
    pub install: Option<LocalInstallSection>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LocalInstallSection {
    #[serde(default)]
    pub projects: Vec<LocalProjectConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LocalProjectConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub skip_install: Option<bool>,
}

/// Effective install settings after validation and overlay merge.
#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub scope: InstallScope,
    pub projects: Vec<ProjectConfig>,
}

impl InstallSettings {
    /// Projects that take part in install and cleanup.
    ///
    /// Always empty for `global` scope.
    pub fn active_projects(&self) -> impl Iterator<Item = &ProjectConfig> {
        let local = self.scope == InstallScope::Local;
        self.projects
            .iter()
            .filter(move |p| local && !p.skip_install)
    }
}

/// Validated configuration.
///
/// Only constructible through validation, so holders can rely on:
/// - non-empty watch paths and extensions,
/// - a concrete install scope,
/// - every active local project having a name and a path.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub install: InstallSettings,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, install: InstallSettings) -> Self {
        Self { watch, install }
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    pub fn install_settings(&self) -> &InstallSettings {
        &self.install
    }
}
