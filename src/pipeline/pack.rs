// src/pipeline/pack.rs

//! `npm pack`, then move the tarball into the artifact directory.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::engine::{CancellationToken, Phase, Task, TaskError, TaskResult};
use crate::pipeline::context::PipelineContext;

pub const PHASE_NAME: &str = "Pack";

pub fn phase(ctx: &Arc<PipelineContext>) -> Phase {
    let pack_ctx = Arc::clone(ctx);
    let move_ctx = Arc::clone(ctx);
    Phase::new(
        PHASE_NAME,
        vec![
            Task::new("Creating package file", move |token| {
                create_package(Arc::clone(&pack_ctx), token)
            }),
            Task::new("Moving file to temp directory", move |_token| {
                move_package(Arc::clone(&move_ctx))
            }),
        ],
    )
}

async fn create_package(ctx: Arc<PipelineContext>, token: CancellationToken) -> TaskResult {
    let request = PipelineContext::npm(ctx.root(), ["pack"]);
    ctx.run(request, token).await?;
    Ok(None)
}

async fn move_package(ctx: Arc<PipelineContext>) -> TaskResult {
    let identity = ctx.task_identity()?;
    let source = ctx.root().join(identity.artifact_file_name());
    let dest = ctx.artifact_path(&identity);

    tokio::fs::create_dir_all(ctx.artifact_dir()).await?;
    move_file(&source, &dest)
        .await
        .map_err(|err| TaskError::soft(format!("moving {}: {err}", source.display())))?;

    Ok(Some(format!("Package created in {}", dest.display())))
}

/// Move `source` to `dest`, replacing any previous artifact.
///
/// A cross-device move is staged next to `dest` and renamed into place, so a
/// reader never sees a partly written tarball.
async fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if tokio::fs::rename(source, dest).await.is_ok() {
        return Ok(());
    }

    let staging = dest.with_extension("tgz.partial");
    debug!(staging = %staging.display(), "rename failed; copying artifact");
    tokio::fs::copy(source, &staging).await?;
    tokio::fs::rename(&staging, dest).await?;
    tokio::fs::remove_file(source).await
}
