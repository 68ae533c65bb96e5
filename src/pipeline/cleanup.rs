// src/pipeline/cleanup.rs

//! Undo the install on shutdown: uninstall or restore the prior version,
//! then drop the artifact.

use std::io;
use std::sync::Arc;

use tracing::debug;

use crate::config::ProjectConfig;
use crate::engine::{CancellationToken, Phase, Task, TaskError, TaskResult};
use crate::exec::ExecError;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::package::is_extraneous;
use crate::types::InstallScope;

pub const PHASE_NAME: &str = "Cleanup";

pub fn phase(ctx: &Arc<PipelineContext>) -> Phase {
    let mut tasks = match ctx.install().scope {
        InstallScope::Global => {
            let ctx = Arc::clone(ctx);
            vec![Task::new("Uninstalling from global prefix", move |token| {
                uninstall_global(Arc::clone(&ctx), token)
            })]
        }
        InstallScope::Local => ctx
            .install()
            .active_projects()
            .map(|project| project_task(ctx, project.clone()))
            .collect(),
    };

    let artifact_ctx = Arc::clone(ctx);
    tasks.push(Task::new("Removing package file", move |_token| {
        remove_artifact(Arc::clone(&artifact_ctx))
    }));

    Phase::new(PHASE_NAME, tasks)
}

fn project_task(ctx: &Arc<PipelineContext>, project: ProjectConfig) -> Task {
    let ctx = Arc::clone(ctx);
    let message = format!("Cleaning up in {}", ctx.project_dir(&project).display());
    Task::new(message, move |token| {
        restore_project(Arc::clone(&ctx), project.clone(), token)
    })
}

async fn uninstall_global(ctx: Arc<PipelineContext>, token: CancellationToken) -> TaskResult {
    let identity = ctx.task_identity()?;
    let request = PipelineContext::npm(ctx.root(), ["un", "-g", identity.name.as_str()]);
    ctx.run(request, token).await?;
    Ok(None)
}

/// Remove the package if the project never declared it, otherwise put the
/// recorded version back.
async fn restore_project(
    ctx: Arc<PipelineContext>,
    project: ProjectConfig,
    token: CancellationToken,
) -> TaskResult {
    let identity = ctx.task_identity()?;
    let name = identity.name.as_str();
    let dir = ctx.project_dir(&project);

    if check_extraneous(&ctx, &project, name, token.clone()).await? {
        ctx.run(PipelineContext::npm(&dir, ["un", name]), token).await?;
        return Ok(Some(format!("Removed {name} from {}", dir.display())));
    }

    let Some(baseline) = ctx.baseline(&project.name) else {
        return Ok(Some(format!("Nothing to restore in {}", dir.display())));
    };

    let spec = baseline.install_spec(name);
    let mut args = vec!["i".to_string()];
    if let Some(flag) = baseline.kind.install_flag() {
        args.push(flag.to_string());
    }
    args.push(spec.clone());
    ctx.run(PipelineContext::npm(&dir, args), token).await?;
    Ok(Some(format!("Restored {spec} in {}", dir.display())))
}

/// `npm ls` exits non-zero when the tree has problems (extraneous packages
/// among them), so its JSON is read on failure too.
async fn check_extraneous(
    ctx: &PipelineContext,
    project: &ProjectConfig,
    name: &str,
    token: CancellationToken,
) -> Result<bool, TaskError> {
    let dir = ctx.project_dir(project);
    let request = PipelineContext::npm(&dir, ["ls", name, "--json", "--depth=0"]);
    let stdout = match ctx.run(request, token).await {
        Ok(output) => output.stdout,
        Err(ExecError::Failed { output, .. }) => output.stdout,
        Err(err) => return Err(err.into()),
    };
    is_extraneous(&stdout, name).map_err(|err| TaskError::soft(err.to_string()))
}

async fn remove_artifact(ctx: Arc<PipelineContext>) -> TaskResult {
    let identity = ctx.task_identity()?;
    let path = ctx.artifact_path(&identity);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no artifact to remove");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
