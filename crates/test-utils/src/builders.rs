#![allow(dead_code)]

use std::path::PathBuf;

use sympack::config::{
    ConfigFile, InstallSection, LocalInstallSection, LocalProjectConfig, ProjectConfig,
    RawConfigFile, RawLocalConfigFile, validate_config,
};
use sympack::errors::Result;
use sympack::types::InstallScope;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the defaults of an empty `Sympack.toml` with local scope and
/// no projects; add at least one project before `build()` unless the scope
/// is switched to global.
pub struct ConfigBuilder {
    raw: RawConfigFile,
    local: Option<RawLocalConfigFile>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawConfigFile {
                install: Some(InstallSection {
                    scope: Some(InstallScope::Local),
                    projects: Vec::new(),
                }),
                ..RawConfigFile::default()
            },
            local: None,
        }
    }

    pub fn scope(mut self, scope: InstallScope) -> Self {
        self.install_mut().scope = Some(scope);
        self
    }

    pub fn watch_path(mut self, pattern: &str) -> Self {
        self.raw.watch.paths.push(pattern.to_string());
        self
    }

    pub fn watch_paths(mut self, patterns: &[&str]) -> Self {
        self.raw.watch.paths = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.raw.watch.extensions = exts.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.raw.watch.use_hash = val;
        self
    }

    pub fn project(mut self, project: ProjectBuilder) -> Self {
        self.install_mut().projects.push(project.build());
        self
    }

    /// Add an overlay entry giving `name` a machine-local path.
    pub fn local_path(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        let local = self.local.get_or_insert_with(|| RawLocalConfigFile {
            install: Some(LocalInstallSection { projects: Vec::new() }),
        });
        if let Some(install) = local.install.as_mut() {
            install.projects.push(LocalProjectConfig {
                name: name.to_string(),
                path: Some(path.into()),
                skip_install: None,
            });
        }
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.raw
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        validate_config(self.raw, self.local)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }

    fn install_mut(&mut self) -> &mut InstallSection {
        self.raw.install.get_or_insert_with(InstallSection::default)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectBuilder {
    project: ProjectConfig,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            project: ProjectConfig {
                name: name.to_string(),
                ..ProjectConfig::default()
            },
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project.path = Some(path.into());
        self
    }

    pub fn no_save(mut self) -> Self {
        self.project.no_save = true;
        self
    }

    pub fn peer_dependencies(mut self) -> Self {
        self.project.has_peer_dependencies = true;
        self
    }

    pub fn skip_install(mut self) -> Self {
        self.project.skip_install = true;
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }
}
