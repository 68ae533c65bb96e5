// src/engine/task.rs

//! A single named, cancellable unit of work.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

use crate::engine::cancel::CancellationToken;
use crate::exec::ExecError;

/// Boxed, sendable future as returned by task operations and collaborator
/// traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Classified failure of a task.
///
/// - `Soft`: this task failed, siblings may still run.
/// - `Abort`: cancellation was requested; the phase unwinds immediately.
/// - `Fatal`: the pipeline cannot usefully continue; the controller shuts down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0}")]
    Soft(String),
    #[error("aborted")]
    Abort,
    #[error("{0}")]
    Fatal(String),
}

impl TaskError {
    pub fn soft(message: impl Into<String>) -> Self {
        TaskError::Soft(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        TaskError::Fatal(message.into())
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, TaskError::Abort)
    }
}

/// A cancelled command unwinds the task; any other command failure is soft.
impl From<ExecError> for TaskError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Cancelled { .. } => TaskError::Abort,
            other => TaskError::Soft(other.to_string()),
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::Soft(err.to_string())
    }
}

/// `Ok(note)` carries an optional message that replaces the task's own
/// message in the success log line.
pub type TaskResult = Result<Option<String>, TaskError>;

type Operation = dyn Fn(CancellationToken) -> BoxFuture<'static, TaskResult> + Send + Sync;

/// One step of a [`Phase`](crate::engine::Phase).
///
/// Created once when the pipeline is defined and re-executed on every run.
/// The task owns its cancellation token; after a token has caused an abort
/// it is swapped for a fresh one so the next run starts clean.
pub struct Task {
    message: String,
    operation: Box<Operation>,
    token: Mutex<CancellationToken>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("message", &self.message)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new<F, Fut>(message: impl Into<String>, operation: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            message: message.into(),
            operation: Box::new(move |token| Box::pin(operation(token))),
            token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Run the operation once.
    ///
    /// A token that is already cancelled short-circuits to `Abort` without
    /// touching the operation. Either way, a token that produced an `Abort`
    /// is replaced before returning.
    pub async fn execute(&self) -> TaskResult {
        let token = self.lock_token().clone();

        if token.is_cancelled() {
            debug!(task = %self.message, "cancellation requested before start");
            self.replace_token(&token);
            return Err(TaskError::Abort);
        }

        let result = (self.operation)(token.clone()).await;

        if matches!(result, Err(TaskError::Abort)) {
            self.replace_token(&token);
        }

        result
    }

    /// Request cancellation of the current (or next) execution.
    ///
    /// Never blocks; the operation is expected to notice and unwind.
    pub fn abort(&self) {
        self.lock_token().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_token().is_cancelled()
    }

    /// Drop a cancellation that arrived too late to affect the execution
    /// that just finished. Returns `true` if a token was discarded.
    pub(crate) fn discard_cancellation(&self) -> bool {
        let mut token = self.lock_token();
        if token.is_cancelled() {
            *token = CancellationToken::new();
            true
        } else {
            false
        }
    }

    fn replace_token(&self, consumed: &CancellationToken) {
        let mut token = self.lock_token();
        // Only swap if nobody replaced it in the meantime.
        if token.same_as(consumed) {
            *token = CancellationToken::new();
        }
    }

    fn lock_token(&self) -> MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
