// src/engine/controller.rs

//! Binds the phase pipeline to file-change events and shutdown requests.
//!
//! State machine:
//!
//! ```text
//! Idle -> Processing -> Idle          normal run
//! Processing -> Aborted -> Processing a newer trigger pre-empted the run
//! * -> ShuttingDown                   stop() / fatal task error
//! ```
//!
//! Runs never overlap: a trigger first aborts whatever phase is running, then
//! waits for the previous run to unwind before starting its own. Triggers are
//! not queued; when several arrive close together only the newest runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::phase::{Phase, PhaseError};
use crate::errors::Result;
use crate::watch::{FileChangeSource, WatchEvent, WatchSubscription};

/// Lifecycle of a [`PipelineController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing,
    Aborted,
    ShuttingDown,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Processing => "processing",
            ControllerState::Aborted => "aborted",
            ControllerState::ShuttingDown => "shutting-down",
        };
        f.write_str(s)
    }
}

/// Owns the phases and drives them in response to triggers.
///
/// One instance per process. Wrap it in an `Arc` to call [`start`](Self::start).
pub struct PipelineController {
    phases: Vec<Phase>,
    cleanup: Option<Phase>,
    source: Box<dyn FileChangeSource>,
    state: watch::Sender<ControllerState>,
    current_phase: Mutex<Option<usize>>,
    /// Held for the whole duration of a run (and of teardown).
    run_lock: tokio::sync::Mutex<()>,
    /// Bumped by every trigger; a run whose number is stale gives way.
    generation: AtomicU64,
    completed_runs: AtomicU64,
    subscription: Mutex<Option<Box<dyn WatchSubscription>>>,
    stopped: watch::Sender<bool>,
}

impl fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phases: Vec<&str> = self.phases.iter().map(Phase::name).collect();
        f.debug_struct("PipelineController")
            .field("phases", &phases)
            .field("cleanup", &self.cleanup.as_ref().map(Phase::name))
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PipelineController {
    pub fn new(phases: Vec<Phase>, source: Box<dyn FileChangeSource>) -> Self {
        let (state, _rx) = watch::channel(ControllerState::Idle);
        let (stopped, _rx) = watch::channel(false);
        Self {
            phases,
            cleanup: None,
            source,
            state,
            current_phase: Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            completed_runs: AtomicU64::new(0),
            subscription: Mutex::new(None),
            stopped,
        }
    }

    /// Phase run during shutdown to undo the effects of the last phase.
    pub fn with_cleanup(mut self, cleanup: Phase) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Number of runs in which every phase succeeded.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::SeqCst)
    }

    /// Name of the phase currently running, if any.
    pub fn current_phase(&self) -> Option<&str> {
        self.running_phase_index().map(|idx| self.phases[idx].name())
    }

    /// Subscribe to the file-change source and run the pipeline on every
    /// event it emits.
    ///
    /// Each event is handled on its own Tokio task so that a new trigger can
    /// pre-empt the run started by the previous one. The returned handle
    /// finishes once the subscription is closed.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let (tx, mut rx) = mpsc::channel::<WatchEvent>(16);
        let subscription = self.source.subscribe(tx)?;
        *self.lock_subscription() = Some(subscription);
        info!("watching for changes");

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if this.state() == ControllerState::ShuttingDown {
                    break;
                }
                let runner = Arc::clone(&this);
                tokio::spawn(async move {
                    runner.handle_event(event).await;
                });
            }
            debug!("file-change event loop finished");
        }))
    }

    /// Log what triggered the run, then [`process`](Self::process).
    pub async fn handle_event(&self, event: WatchEvent) {
        match &event {
            WatchEvent::Ready { files } => {
                info!(files, "initial scan complete");
            }
            WatchEvent::Changed { paths } => {
                info!(count = paths.len(), "detected changes");
                for path in paths {
                    info!(path = %path, "changed");
                }
            }
        }
        self.process().await;
    }

    /// Run every phase in order, pre-empting any run already in flight.
    pub async fn process(&self) {
        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.state() {
            ControllerState::ShuttingDown => {
                debug!(run, "ignoring trigger during shutdown");
                return;
            }
            ControllerState::Processing | ControllerState::Aborted => {
                if let Some(idx) = self.running_phase_index() {
                    let phase = &self.phases[idx];
                    info!(run, phase = %phase.name(), "new trigger while running; aborting current run");
                    phase.abort().await;
                }
            }
            ControllerState::Idle => {}
        }

        let guard = self.run_lock.lock().await;

        if self.is_superseded(run) {
            debug!(run, "trigger superseded by a newer one");
            return;
        }
        if self.state() == ControllerState::ShuttingDown {
            return;
        }

        self.state.send_replace(ControllerState::Processing);
        info!(run, "pipeline run started");

        for (idx, phase) in self.phases.iter().enumerate() {
            if self.state() == ControllerState::ShuttingDown {
                return;
            }
            if self.is_superseded(run) {
                info!(run, "pipeline run superseded before phase {}", phase.name());
                self.transition(ControllerState::Aborted);
                return;
            }

            self.set_running_phase(Some(idx));
            let result = phase.run().await;
            self.set_running_phase(None);

            match result {
                Ok(()) => {}
                Err(PhaseError::Aborted) => {
                    info!(run, phase = %phase.name(), "pipeline run aborted");
                    self.transition(ControllerState::Aborted);
                    return;
                }
                Err(err @ PhaseError::Fatal { .. }) => {
                    error!(run, phase = %phase.name(), error = %err, "unrecoverable error; stopping");
                    let started = self.begin_shutdown();
                    drop(guard);
                    if started {
                        self.teardown(None).await;
                    }
                    return;
                }
                Err(err @ PhaseError::Failed { .. }) => {
                    warn!(
                        run,
                        phase = %phase.name(),
                        error = %err,
                        "pipeline run failed; fix the issues and save to restart"
                    );
                    self.transition(ControllerState::Idle);
                    return;
                }
            }
        }

        self.transition(ControllerState::Idle);
        self.completed_runs.fetch_add(1, Ordering::SeqCst);
        info!(run, "pipeline run completed; watching for changes");
    }

    /// Gracefully shut down: abort the running phase, undo installation if
    /// it may have happened, close the subscription.
    ///
    /// Only the first call does anything; later calls log a warning.
    pub async fn stop(&self) {
        if !self.begin_shutdown() {
            warn!("stop requested while already shutting down; ignoring");
            return;
        }
        info!("stopping");

        let running = self.running_phase_index();
        if let Some(idx) = running {
            let phase = &self.phases[idx];
            info!(phase = %phase.name(), "aborting running phase");
            phase.abort().await;
        }

        self.teardown(running).await;
    }

    /// Resolve once teardown has finished.
    pub async fn wait_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// `running` is the phase that was in flight when shutdown began.
    async fn teardown(&self, running: Option<usize>) {
        let _guard = self.run_lock.lock().await;

        // Earlier phases leave nothing outside the package to undo.
        let install_may_be_in_place = match running {
            None => true,
            Some(idx) => idx + 1 == self.phases.len(),
        };

        match &self.cleanup {
            Some(cleanup) if install_may_be_in_place => match cleanup.run().await {
                Ok(()) => info!(phase = %cleanup.name(), "cleanup finished"),
                Err(err) => warn!(phase = %cleanup.name(), error = %err, "cleanup incomplete"),
            },
            Some(cleanup) => {
                info!(phase = %cleanup.name(), "nothing installed by this run; skipping cleanup");
            }
            None => {}
        }

        if let Some(subscription) = self.lock_subscription().take() {
            subscription.close();
            debug!("file-change subscription closed");
        }

        self.stopped.send_replace(true);
        info!("stopped");
    }

    /// Move to `ShuttingDown`. Returns `false` if already there.
    fn begin_shutdown(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ControllerState::ShuttingDown {
                false
            } else {
                *state = ControllerState::ShuttingDown;
                true
            }
        })
    }

    /// Set `next` unless shutdown has already begun.
    fn transition(&self, next: ControllerState) {
        self.state.send_if_modified(|state| {
            if *state == ControllerState::ShuttingDown || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn is_superseded(&self, run: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != run
    }

    fn running_phase_index(&self) -> Option<usize> {
        *self.lock_current()
    }

    fn set_running_phase(&self, idx: Option<usize>) {
        *self.lock_current() = idx;
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<usize>> {
        self.current_phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Box<dyn WatchSubscription>>> {
        self.subscription.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
