// src/exec/mod.rs

//! Process execution layer.
//!
//! Pipeline tasks never spawn processes directly; they go through a
//! [`CommandExecutor`] so tests can swap in a fake that records command lines.
//!
//! - [`command`] holds the request/response types and [`ExecError`].
//! - [`backend`] provides the [`CommandExecutor`] trait and the production
//!   [`ProcessExecutor`] built on `tokio::process`.

pub mod backend;
pub mod command;

pub use backend::{CommandExecutor, ProcessExecutor};
pub use command::{CommandOutput, CommandRequest, ExecError};
