// src/pipeline/install.rs

//! Install the packed tarball globally or into each consuming project.

use std::sync::Arc;

use crate::config::ProjectConfig;
use crate::engine::{CancellationToken, Phase, Task, TaskResult};
use crate::pipeline::context::PipelineContext;
use crate::types::InstallScope;

pub const PHASE_NAME: &str = "Install";

pub fn phase(ctx: &Arc<PipelineContext>) -> Phase {
    let tasks = match ctx.install().scope {
        InstallScope::Global => {
            let ctx = Arc::clone(ctx);
            vec![Task::new("Installing to global prefix", move |token| {
                install_global(Arc::clone(&ctx), token)
            })]
        }
        InstallScope::Local => ctx
            .install()
            .active_projects()
            .map(|project| project_task(ctx, project.clone()))
            .collect(),
    };
    Phase::new(PHASE_NAME, tasks)
}

fn project_task(ctx: &Arc<PipelineContext>, project: ProjectConfig) -> Task {
    let ctx = Arc::clone(ctx);
    let message = format!("Installing in {}", ctx.project_dir(&project).display());
    Task::new(message, move |token| {
        install_in_project(Arc::clone(&ctx), project.clone(), token)
    })
}

async fn install_global(ctx: Arc<PipelineContext>, token: CancellationToken) -> TaskResult {
    let identity = ctx.task_identity()?;
    let artifact = ctx.artifact_path(&identity).to_string_lossy().into_owned();
    let request = PipelineContext::npm(
        ctx.root(),
        ["i", "-g", artifact.as_str(), "--no-save", "--ignore-scripts"],
    );
    ctx.run(request, token).await?;
    Ok(Some("Package installed globally".to_string()))
}

async fn install_in_project(
    ctx: Arc<PipelineContext>,
    project: ProjectConfig,
    token: CancellationToken,
) -> TaskResult {
    let identity = ctx.task_identity()?;
    let artifact = ctx.artifact_path(&identity).to_string_lossy().into_owned();
    let dir = ctx.project_dir(&project);
    let request = PipelineContext::npm(&dir, project_install_args(&artifact, &project));
    ctx.run(request, token).await?;
    Ok(Some(format!("Package installed in {}", dir.display())))
}

/// `npm i` arguments for one project, artifact first.
pub fn project_install_args(artifact: &str, project: &ProjectConfig) -> Vec<String> {
    let mut args = vec!["i".to_string(), artifact.to_string()];
    if project.no_save {
        args.push("--no-save".to_string());
    }
    if project.has_peer_dependencies {
        args.push("--legacy-peer-deps".to_string());
    }
    args.push("--ignore-scripts".to_string());
    args
}
