// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::watch;

use sympack::engine::{CancellationToken, Task, TaskError, TaskResult};

pub use sympack_test_utils::{init_tracing, with_timeout};

/// Counts how often a task body ran and lets a test wait for it.
#[derive(Debug, Clone)]
pub struct Probe {
    hits: Arc<watch::Sender<usize>>,
}

impl Probe {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { hits: Arc::new(tx) }
    }

    /// Record a hit and return the new count.
    pub fn hit(&self) -> usize {
        let mut count = 0;
        self.hits.send_modify(|n| {
            *n += 1;
            count = *n;
        });
        count
    }

    pub fn count(&self) -> usize {
        *self.hits.borrow()
    }

    pub async fn wait_for(&self, n: usize) {
        let mut rx = self.hits.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

async fn fixed(probe: Probe, result: TaskResult) -> TaskResult {
    probe.hit();
    result
}

/// Task that records a hit and returns `result`.
pub fn task(message: &str, probe: &Probe, result: TaskResult) -> Task {
    let probe = probe.clone();
    Task::new(message, move |_token| fixed(probe.clone(), result.clone()))
}

pub fn ok_task(message: &str, probe: &Probe) -> Task {
    task(message, probe, Ok(None))
}

pub fn soft_task(message: &str, probe: &Probe, error: &str) -> Task {
    task(message, probe, Err(TaskError::soft(error)))
}

pub fn fatal_task(message: &str, probe: &Probe, error: &str) -> Task {
    task(message, probe, Err(TaskError::fatal(error)))
}

pub fn abort_task(message: &str, probe: &Probe) -> Task {
    task(message, probe, Err(TaskError::Abort))
}

async fn until_cancelled(probe: Probe, aborted: Probe, token: CancellationToken) -> TaskResult {
    probe.hit();
    token.cancelled().await;
    aborted.hit();
    Err(TaskError::Abort)
}

/// Task that runs until its token is cancelled, every time.
///
/// `probe` counts starts, `aborted` counts observed cancellations.
pub fn blocking_task(message: &str, probe: &Probe, aborted: &Probe) -> Task {
    let probe = probe.clone();
    let aborted = aborted.clone();
    Task::new(message, move |token| {
        until_cancelled(probe.clone(), aborted.clone(), token)
    })
}

async fn block_first(probe: Probe, aborted: Probe, token: CancellationToken) -> TaskResult {
    if probe.hit() == 1 {
        token.cancelled().await;
        aborted.hit();
        return Err(TaskError::Abort);
    }
    Ok(None)
}

/// Task that blocks until cancelled on its first execution only.
pub fn block_once_task(message: &str, probe: &Probe, aborted: &Probe) -> Task {
    let probe = probe.clone();
    let aborted = aborted.clone();
    Task::new(message, move |token| {
        block_first(probe.clone(), aborted.clone(), token)
    })
}

async fn wait_gate(probe: Probe, mut gate: watch::Receiver<bool>) -> TaskResult {
    probe.hit();
    let _ = gate.wait_for(|open| *open).await;
    Ok(None)
}

/// Task that holds until `gate` is set to `true`, ignoring cancellation.
pub fn gated_task(message: &str, probe: &Probe, gate: &watch::Receiver<bool>) -> Task {
    let probe = probe.clone();
    let gate = gate.clone();
    Task::new(message, move |_token| wait_gate(probe.clone(), gate.clone()))
}
