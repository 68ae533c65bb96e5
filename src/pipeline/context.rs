// src/pipeline/context.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{InstallSettings, ProjectConfig};
use crate::engine::{CancellationToken, TaskError};
use crate::exec::{CommandExecutor, CommandOutput, CommandRequest, ExecError};
use crate::pipeline::package::{PackageIdentity, ProjectBaseline, read_manifest};

/// Name of the directory under the system temp dir holding packed artifacts.
pub const ARTIFACT_DIR_NAME: &str = "sympack";

/// Everything the phase tasks need, passed explicitly instead of living in
/// process-wide state.
pub struct PipelineContext {
    root: PathBuf,
    artifact_dir: PathBuf,
    install: InstallSettings,
    executor: Arc<dyn CommandExecutor>,
    baselines: HashMap<String, ProjectBaseline>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("root", &self.root)
            .field("artifact_dir", &self.artifact_dir)
            .field("install", &self.install)
            .field("baselines", &self.baselines)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    pub fn new(
        root: impl Into<PathBuf>,
        install: InstallSettings,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            root: root.into(),
            artifact_dir: std::env::temp_dir().join(ARTIFACT_DIR_NAME),
            install,
            executor,
            baselines: HashMap::new(),
        }
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Record how each active project depended on the package before the
    /// session, so cleanup can put it back.
    ///
    /// A project whose `package.json` cannot be read simply gets no baseline.
    pub fn with_project_baselines(mut self) -> Self {
        let Ok(identity) = self.identity() else {
            warn!("cannot read package name; project baselines not recorded");
            return self;
        };

        let mut baselines = HashMap::new();
        for project in self.install.active_projects() {
            let dir = self.project_dir(project);
            match read_manifest(&dir) {
                Ok(manifest) => {
                    if let Some(baseline) = manifest.baseline_for(&identity.name) {
                        debug!(
                            project = %project.name,
                            version = %baseline.version,
                            kind = %baseline.kind,
                            "recorded prior dependency"
                        );
                        baselines.insert(project.name.clone(), baseline);
                    }
                }
                Err(err) => {
                    warn!(project = %project.name, error = %err, "cannot read project package.json");
                }
            }
        }
        self.baselines = baselines;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn install(&self) -> &InstallSettings {
        &self.install
    }

    pub fn baseline(&self, project: &str) -> Option<&ProjectBaseline> {
        self.baselines.get(project)
    }

    /// Absolute directory of a consuming project.
    pub fn project_dir(&self, project: &ProjectConfig) -> PathBuf {
        match &project.path {
            Some(path) => self.root.join(path),
            None => self.root.clone(),
        }
    }

    /// Name and version from the package's own `package.json`.
    pub fn identity(&self) -> crate::errors::Result<PackageIdentity> {
        read_manifest(&self.root)?.identity()
    }

    /// [`identity`](Self::identity) for use inside a task: without it nothing
    /// can be packed or installed, so failure is fatal.
    pub fn task_identity(&self) -> Result<PackageIdentity, TaskError> {
        self.identity().map_err(|err| TaskError::fatal(err.to_string()))
    }

    /// Where the packed tarball for `identity` lives between pack and cleanup.
    pub fn artifact_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.artifact_dir.join(identity.artifact_file_name())
    }

    pub async fn run(
        &self,
        request: CommandRequest,
        token: CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        self.executor.run(request, token).await
    }

    /// Shorthand for an `npm` invocation in `cwd`.
    pub fn npm<I, S>(cwd: &Path, args: I) -> CommandRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandRequest::new("npm").args(args).current_dir(cwd)
    }
}
