use std::sync::{Arc, Mutex, MutexGuard};

use sympack::engine::{BoxFuture, CancellationToken};
use sympack::exec::{CommandExecutor, CommandOutput, CommandRequest, ExecError};
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    Fail(CommandOutput),
    /// Run until the token is cancelled.
    Block,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<CommandRequest>,
    responses: Vec<(String, Response)>,
}

/// A fake executor that:
/// - records every request it receives
/// - answers with scripted output, matched by command-line prefix
/// - succeeds with empty output for anything unscripted
///
/// Clones share state, so a test can keep one handle and give the other to
/// the pipeline.
#[derive(Debug, Clone)]
pub struct FakeExecutor {
    state: Arc<Mutex<State>>,
    call_count: Arc<watch::Sender<usize>>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            call_count: Arc::new(tx),
        }
    }

    /// Succeed with `stdout` for commands starting with `prefix`.
    pub fn respond(&self, prefix: &str, stdout: &str) -> &Self {
        self.script(prefix, Response::Output(CommandOutput::success(stdout)))
    }

    /// Exit with `exit_code` and the given output for commands starting with
    /// `prefix`.
    pub fn fail(&self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
        self.script(
            prefix,
            Response::Fail(CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        )
    }

    /// Never finish commands starting with `prefix` until cancelled.
    pub fn block(&self, prefix: &str) -> &Self {
        self.script(prefix, Response::Block)
    }

    /// Command lines received so far, e.g. `"npm run build"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.to_string()).collect()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.lock().calls.clone()
    }

    /// Wait until at least `n` commands have been received.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.call_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn script(&self, prefix: &str, response: Response) -> &Self {
        self.lock().responses.push((prefix.to_string(), response));
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl CommandExecutor for FakeExecutor {
    fn run<'a>(
        &'a self,
        request: CommandRequest,
        token: CancellationToken,
    ) -> BoxFuture<'a, Result<CommandOutput, ExecError>> {
        Box::pin(async move {
            let program = request.program.clone();
            if token.is_cancelled() {
                return Err(ExecError::Cancelled { program });
            }

            let line = request.to_string();
            let response = {
                let mut state = self.lock();
                state.calls.push(request);
                state
                    .responses
                    .iter()
                    .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                    .map(|(_, r)| r.clone())
            };
            self.call_count.send_modify(|count| *count += 1);

            match response {
                None => Ok(CommandOutput::default()),
                Some(Response::Output(output)) => Ok(output),
                Some(Response::Fail(output)) => Err(ExecError::Failed { program, output }),
                Some(Response::Block) => {
                    token.cancelled().await;
                    Err(ExecError::Cancelled { program })
                }
            }
        })
    }
}
