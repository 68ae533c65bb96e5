// src/pipeline/build.rs

//! Type-check, then run the package's own build script.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::engine::{CancellationToken, Phase, Task, TaskError, TaskResult};
use crate::exec::{CommandRequest, ExecError};
use crate::pipeline::context::PipelineContext;

pub const PHASE_NAME: &str = "Build";

static MISSING_BUILD_SCRIPT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"Missing script:\s*"?build"?"#).ok());

pub fn phase(ctx: &Arc<PipelineContext>) -> Phase {
    let compile_ctx = Arc::clone(ctx);
    let build_ctx = Arc::clone(ctx);
    Phase::new(
        PHASE_NAME,
        vec![
            Task::new("Compiling files", move |token| {
                compile_files(Arc::clone(&compile_ctx), token)
            }),
            Task::new("Running build script", move |token| {
                run_build_script(Arc::clone(&build_ctx), token)
            }),
        ],
    )
}

async fn compile_files(ctx: Arc<PipelineContext>, token: CancellationToken) -> TaskResult {
    let root = ctx.root().to_string_lossy().into_owned();
    let request = CommandRequest::new("tsc")
        .args(["--project", root.as_str(), "--noEmit"])
        .current_dir(ctx.root());
    ctx.run(request, token).await?;
    Ok(Some("Type check passed".to_string()))
}

async fn run_build_script(ctx: Arc<PipelineContext>, token: CancellationToken) -> TaskResult {
    let request = PipelineContext::npm(ctx.root(), ["run", "build"]);
    match ctx.run(request, token).await {
        Ok(_) => Ok(Some("Project built".to_string())),
        Err(err) => Err(classify_build_error(err)),
    }
}

/// A missing `build` script gets a readable message; other failures keep
/// the default classification.
pub fn classify_build_error(err: ExecError) -> TaskError {
    if let ExecError::Failed { output, .. } = &err {
        if mentions_missing_build_script(&output.stderr)
            || mentions_missing_build_script(&output.stdout)
        {
            return TaskError::soft("No build script found in package.json");
        }
    }
    TaskError::from(err)
}

fn mentions_missing_build_script(text: &str) -> bool {
    MISSING_BUILD_SCRIPT
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}
