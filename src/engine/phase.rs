// src/engine/phase.rs

//! Sequential group of tasks forming one pipeline stage.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::engine::task::{Task, TaskError};

/// Lifecycle of a [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Ready,
    Running,
    Aborted,
    Completed,
}

impl PhaseState {
    /// `run()` has returned.
    pub fn is_settled(self) -> bool {
        matches!(self, PhaseState::Aborted | PhaseState::Completed)
    }
}

/// One soft task failure recorded by a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
}

/// Why a phase did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    /// Every task ran; some failed softly.
    #[error("{} task(s) failed.", failures.len())]
    Failed { failures: Vec<TaskFailure> },

    /// A task observed cancellation; remaining tasks were skipped.
    #[error("Process aborted")]
    Aborted,

    /// A task reported an unrecoverable condition.
    #[error("{task}: {message}")]
    Fatal { task: String, message: String },
}

impl PhaseError {
    pub fn is_abort(&self) -> bool {
        matches!(self, PhaseError::Aborted)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PhaseError::Fatal { .. })
    }
}

pub type PhaseResult = Result<(), PhaseError>;

/// An ordered list of [`Task`]s run strictly one after another.
///
/// `run()` and `abort()` both take `&self` so that a controller can abort a
/// phase that another flow of control is currently running.
pub struct Phase {
    name: String,
    tasks: Vec<Task>,
    state: watch::Sender<PhaseState>,
    /// Index of the task currently executing.
    current: Mutex<Option<usize>>,
    abort_requested: AtomicBool,
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Phase {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        let (state, _rx) = watch::channel(PhaseState::Ready);
        Self {
            name: name.into(),
            tasks,
            state,
            current: Mutex::new(None),
            abort_requested: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn state(&self) -> PhaseState {
        *self.state.borrow()
    }

    /// Message of the task currently executing, if any.
    pub fn current_task(&self) -> Option<&str> {
        let current = *self.lock_current();
        current.map(|idx| self.tasks[idx].message())
    }

    /// Run every task in order.
    ///
    /// Soft failures are collected and reported together at the end; an
    /// abort or fatal error stops the phase at that task.
    pub async fn run(&self) -> PhaseResult {
        self.abort_requested.store(false, Ordering::SeqCst);
        self.state.send_replace(PhaseState::Running);
        info!(phase = %self.name, "phase started");

        let mut failures = Vec::new();

        for (idx, task) in self.tasks.iter().enumerate() {
            {
                let mut current = self.lock_current();
                // Checked under the lock so `abort()` either sees this task as
                // current or we see its request here.
                if self.abort_requested.load(Ordering::SeqCst) {
                    drop(current);
                    info!(phase = %self.name, task = %task.message(), "phase aborted before task");
                    return self.finish(Err(PhaseError::Aborted));
                }
                *current = Some(idx);
            }

            info!(phase = %self.name, task = %task.message(), "task started");
            let result = task.execute().await;

            {
                let mut current = self.lock_current();
                *current = None;
                if !matches!(result, Err(TaskError::Abort)) {
                    task.discard_cancellation();
                }
            }

            match result {
                Ok(note) => {
                    info!(
                        phase = %self.name,
                        task = %note.as_deref().unwrap_or(task.message()),
                        "task succeeded"
                    );
                }
                Err(TaskError::Abort) => {
                    info!(phase = %self.name, task = %task.message(), "task aborted");
                    return self.finish(Err(PhaseError::Aborted));
                }
                Err(TaskError::Fatal(message)) => {
                    error!(phase = %self.name, task = %task.message(), error = %message, "task failed fatally");
                    return self.finish(Err(PhaseError::Fatal {
                        task: task.message().to_string(),
                        message,
                    }));
                }
                Err(TaskError::Soft(message)) => {
                    warn!(phase = %self.name, task = %task.message(), error = %message, "task failed");
                    failures.push(TaskFailure {
                        task: task.message().to_string(),
                        message,
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(phase = %self.name, "phase completed");
            self.finish(Ok(()))
        } else {
            warn!(phase = %self.name, failed = failures.len(), "phase completed with failures");
            self.finish(Err(PhaseError::Failed { failures }))
        }
    }

    /// Stop a running phase and wait until `run()` has returned.
    ///
    /// Cancels the current task (if any) and prevents further tasks from
    /// starting. Returns immediately when the phase is not running.
    pub async fn abort(&self) {
        let mut rx = self.state.subscribe();
        if *rx.borrow_and_update() != PhaseState::Running {
            return;
        }

        self.abort_requested.store(true, Ordering::SeqCst);
        {
            let current = self.lock_current();
            if let Some(idx) = *current {
                self.tasks[idx].abort();
            }
        }

        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| state.is_settled()).await;
    }

    fn finish(&self, result: PhaseResult) -> PhaseResult {
        let state = match &result {
            Err(PhaseError::Aborted) => PhaseState::Aborted,
            _ => PhaseState::Completed,
        };
        self.state.send_replace(state);
        result
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<usize>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
