// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;
pub mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::gitignore::ensure_ignored;
use crate::config::{ConfigFile, LOCAL_CONFIG_FILE, config_root_dir, load_and_validate};
use crate::engine::{ControllerState, Phase, PipelineController};
use crate::exec::ProcessExecutor;
use crate::pipeline::{PipelineContext, build_phases, cleanup_phase};
use crate::watch::NotifySource;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and `.gitignore` upkeep
/// - the pipeline context and its phases
/// - the file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path, &args.local_config)?;
    let root = config_root_dir(&config_path);

    let ctx = Arc::new(
        PipelineContext::new(&root, cfg.install_settings().clone(), Arc::new(ProcessExecutor::new()))
            .with_project_baselines(),
    );
    let phases = build_phases(&ctx);
    let cleanup = cleanup_phase(&ctx);

    if args.dry_run {
        print_dry_run(&cfg, &ctx, &phases, &cleanup);
        return Ok(());
    }

    keep_local_config_ignored(&root);

    let source = NotifySource::from_section(&root, cfg.watch_section())?;
    let controller = Arc::new(PipelineController::new(phases, Box::new(source)).with_cleanup(cleanup));

    if args.once {
        run_once(&controller, tokio::signal::ctrl_c()).await;
        return Ok(());
    }

    let events = controller.start()?;
    let interrupt = stop_on_signal(&controller, tokio::signal::ctrl_c());

    controller.wait_stopped().await;
    interrupt.abort();
    events.abort();
    Ok(())
}

/// Run the pipeline a single time, then stop (and clean up).
///
/// If `signal` resolves first, the run is aborted through
/// [`PipelineController::stop`] instead.
pub async fn run_once<F>(controller: &Arc<PipelineController>, signal: F)
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    info!("running pipeline once");
    let interrupt = stop_on_signal(controller, signal);

    controller.process().await;
    if controller.state() != ControllerState::ShuttingDown {
        controller.stop().await;
    }

    controller.wait_stopped().await;
    interrupt.abort();
}

/// Spawn a task that stops `controller` once `signal` resolves.
///
/// If the signal cannot be listened for, the task logs and exits without
/// stopping anything.
pub fn stop_on_signal<F>(controller: &Arc<PipelineController>, signal: F) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("interrupt received");
        controller.stop().await;
    })
}

fn keep_local_config_ignored(root: &Path) {
    match ensure_ignored(root, LOCAL_CONFIG_FILE) {
        Ok(true) => info!("added {LOCAL_CONFIG_FILE} to .gitignore"),
        Ok(false) => {}
        Err(err) => warn!(error = %err, "could not update .gitignore"),
    }
}

/// Print the resolved configuration and the phases that would run.
fn print_dry_run(cfg: &ConfigFile, ctx: &PipelineContext, phases: &[Phase], cleanup: &Phase) {
    let watch = cfg.watch_section();
    let install = cfg.install_settings();

    println!("sympack dry-run");
    println!("  root = {}", ctx.root().display());
    println!("  artifact_dir = {}", ctx.artifact_dir().display());
    println!("  watch.paths = {:?}", watch.paths);
    println!("  watch.extensions = {:?}", watch.extensions);
    println!("  watch.debounce_ms = {}", watch.debounce_ms);
    println!("  watch.use_hash = {}", watch.use_hash);
    println!("  install.scope = {}", install.scope);
    println!();

    println!("projects ({}):", install.projects.len());
    for project in &install.projects {
        println!("  - {}", project.name);
        println!("      path: {}", ctx.project_dir(project).display());
        if project.skip_install {
            println!("      skip_install: true");
        }
        if project.no_save {
            println!("      no_save: true");
        }
        if project.has_peer_dependencies {
            println!("      has_peer_dependencies: true");
        }
        if let Some(baseline) = ctx.baseline(&project.name) {
            println!("      prior: {} {}", baseline.kind, baseline.version);
        }
    }
    println!();

    println!("phases:");
    for phase in phases.iter().chain(std::iter::once(cleanup)) {
        println!("  - {}", phase.name());
        for task in phase.tasks() {
            println!("      {}", task.message());
        }
    }

    debug!("dry-run complete (no execution)");
}
