// src/engine/mod.rs

//! Orchestration engine for sympack.
//!
//! This module ties together:
//! - [`Task`]: one named, cancellable step
//! - [`Phase`]: tasks run strictly in order, soft failures collected
//! - [`PipelineController`]: phases bound to file-change triggers and
//!   shutdown requests
//!
//! Nothing here knows about npm; the concrete phases are assembled in
//! [`crate::pipeline`].

pub mod cancel;
pub mod controller;
pub mod phase;
pub mod task;

pub use cancel::CancellationToken;
pub use controller::{ControllerState, PipelineController};
pub use phase::{Phase, PhaseError, PhaseResult, PhaseState, TaskFailure};
pub use task::{BoxFuture, Task, TaskError, TaskResult};
