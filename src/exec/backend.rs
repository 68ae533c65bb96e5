// src/exec/backend.rs

//! Pluggable command executor abstraction.
//!
//! Pipeline tasks talk to a `CommandExecutor` instead of `tokio::process`.
//!
//! - [`ProcessExecutor`] is the implementation used by `sympack`. It spawns
//!   the program in its own process group, captures its output and
//!   terminates the whole group when the task's cancellation token fires.
//! - Tests provide their own implementation that records command lines and
//!   returns scripted output without spawning anything.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{BoxFuture, CancellationToken};
use crate::exec::command::{CommandOutput, CommandRequest, ExecError};

/// How long a cancelled process group gets between SIGTERM and SIGKILL.
#[cfg(unix)]
const TERM_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

/// Runs external programs on behalf of pipeline tasks.
pub trait CommandExecutor: Send + Sync {
    /// Run `request` to completion.
    ///
    /// A non-zero exit is reported as [`ExecError::Failed`]. When `token` is
    /// cancelled while the program runs, the process is terminated and
    /// [`ExecError::Cancelled`] is returned.
    fn run<'a>(
        &'a self,
        request: CommandRequest,
        token: CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, ExecError>>;
}

/// Real executor used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn run<'a>(
        &'a self,
        request: CommandRequest,
        token: CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, ExecError>> {
        Box::pin(run_process(request, token))
    }
}

async fn run_process(
    request: CommandRequest,
    token: CancellationToken,
) -> Result<CommandOutput, ExecError> {
    let program = request.program.clone();

    if token.is_cancelled() {
        return Err(ExecError::Cancelled { program });
    }

    info!(cmd = %request, cwd = %request.cwd.display(), "starting process");

    // npm and friends are batch files on Windows and need the shell.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&request.program).args(&request.args);
        c
    } else {
        let mut c = Command::new(&request.program);
        c.args(&request.args);
        c
    };

    cmd.current_dir(&request.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // npm runs scripts as grandchildren; a group lets cancellation reach them.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;

    // Always drain both pipes so a chatty child never blocks on a full buffer.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;

            let output = CommandOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: collect(stdout).await,
                stderr: collect(stderr).await,
            };

            debug!(
                cmd = %request,
                exit_code = output.exit_code,
                stdout = %output.stdout.trim_end(),
                stderr = %output.stderr.trim_end(),
                "process exited"
            );

            if output.is_success() {
                Ok(output)
            } else {
                Err(ExecError::Failed { program, output })
            }
        }

        _ = token.cancelled() => {
            info!(cmd = %request, "cancellation requested; terminating process");
            if let Err(e) = terminate(&mut child).await {
                warn!(cmd = %request, error = %e, "failed to terminate process on cancellation");
            }
            stdout.abort();
            stderr.abort();
            Err(ExecError::Cancelled { program })
        }
    }
}

/// SIGTERM the child's process group, give it [`TERM_GRACE`] to exit, then
/// SIGKILL whatever is left of the group and reap the child.
#[cfg(unix)]
async fn terminate(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };
    let group = pid as libc::pid_t;

    // SAFETY: killpg only sends a signal; `group` is the group created at spawn.
    unsafe {
        libc::killpg(group, libc::SIGTERM);
    }

    let exited = tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok();
    if !exited {
        debug!(pid, "process group ignored SIGTERM; sending SIGKILL");
    }

    // Also sweeps grandchildren that outlived the direct child.
    // SAFETY: as above.
    unsafe {
        libc::killpg(group, libc::SIGKILL);
    }

    if !exited {
        child.wait().await?;
    }
    Ok(())
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!(error = %e, "error reading process output");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(handle: JoinHandle<String>) -> String {
    handle.await.unwrap_or_default()
}
