// src/pipeline/mod.rs

//! The concrete npm pipeline: build, pack, install, and the cleanup phase
//! run on shutdown.
//!
//! Each submodule exposes a `phase(&ctx)` factory. Tasks hold an
//! `Arc<PipelineContext>` and go through its [`CommandExecutor`](crate::exec::CommandExecutor),
//! so the whole pipeline can run against a fake executor in tests.

pub mod build;
pub mod cleanup;
pub mod context;
pub mod install;
pub mod pack;
pub mod package;

use std::sync::Arc;

use crate::engine::Phase;

pub use context::{ARTIFACT_DIR_NAME, PipelineContext};
pub use package::{
    PackageIdentity, PackageManifest, ProjectBaseline, artifact_file_name, is_extraneous,
    read_manifest,
};

/// Phases run on every trigger, in order.
pub fn build_phases(ctx: &Arc<PipelineContext>) -> Vec<Phase> {
    vec![build::phase(ctx), pack::phase(ctx), install::phase(ctx)]
}

pub fn cleanup_phase(ctx: &Arc<PipelineContext>) -> Phase {
    cleanup::phase(ctx)
}
