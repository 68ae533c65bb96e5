// tests/controller_triggers.rs

mod common;
use crate::common::{
    Probe, block_once_task, fatal_task, gated_task, init_tracing, ok_task, soft_task,
    with_timeout,
};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use sympack::engine::{ControllerState, Phase, PipelineController};
use sympack::watch::WatchEvent;
use sympack_test_utils::FakeSource;

type TestResult = Result<(), Box<dyn Error>>;

fn controller(phases: Vec<Phase>, cleanup: Phase) -> (Arc<PipelineController>, sympack_test_utils::FakeSourceHandle) {
    let (source, handle) = FakeSource::new();
    let controller = PipelineController::new(phases, Box::new(source)).with_cleanup(cleanup);
    (Arc::new(controller), handle)
}

async fn wait_for_completed_runs(controller: &PipelineController, n: u64) {
    while controller.completed_runs() < n {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn process_runs_every_phase_and_returns_to_idle() -> TestResult {
    init_tracing();

    let (build, pack, install, cleanup) = (Probe::new(), Probe::new(), Probe::new(), Probe::new());
    let (c, _handle) = controller(
        vec![
            Phase::new("Build", vec![ok_task("build", &build)]),
            Phase::new("Pack", vec![ok_task("pack", &pack)]),
            Phase::new("Install", vec![ok_task("install", &install)]),
        ],
        Phase::new("Cleanup", vec![ok_task("cleanup", &cleanup)]),
    );

    assert_eq!(c.state(), ControllerState::Idle);
    with_timeout(c.process()).await;

    assert_eq!((build.count(), pack.count(), install.count()), (1, 1, 1));
    assert_eq!(cleanup.count(), 0);
    assert_eq!(c.state(), ControllerState::Idle);
    assert_eq!(c.completed_runs(), 1);
    assert_eq!(c.current_phase(), None);
    Ok(())
}

#[tokio::test]
async fn new_trigger_aborts_the_running_pass_and_restarts() -> TestResult {
    init_tracing();

    let started = Probe::new();
    let aborted = Probe::new();
    let install = Probe::new();
    let (c, _handle) = controller(
        vec![
            Phase::new("Build", vec![block_once_task("build", &started, &aborted)]),
            Phase::new("Install", vec![ok_task("install", &install)]),
        ],
        Phase::new("Cleanup", vec![]),
    );

    let first = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.process().await })
    };
    with_timeout(started.wait_for(1)).await;
    assert_eq!(c.state(), ControllerState::Processing);
    assert_eq!(c.current_phase(), Some("Build"));

    with_timeout(c.process()).await;
    with_timeout(first).await?;

    assert_eq!(aborted.count(), 1, "first pass must observe the abort");
    assert_eq!(started.count(), 2);
    assert_eq!(install.count(), 1, "only the second pass reaches install");
    assert_eq!(c.completed_runs(), 1);
    assert_eq!(c.state(), ControllerState::Idle);
    Ok(())
}

#[tokio::test]
async fn aborted_run_stays_aborted_until_the_next_trigger() -> TestResult {
    init_tracing();

    let (started, aborted, install) = (Probe::new(), Probe::new(), Probe::new());
    let (gate_tx, gate_rx) = watch::channel(false);
    let (c, _handle) = controller(
        vec![
            Phase::new("Build", vec![block_once_task("build", &started, &aborted)]),
            Phase::new("Install", vec![gated_task("install", &install, &gate_rx)]),
        ],
        Phase::new("Cleanup", vec![]),
    );
    let mut states = c.subscribe_state();

    let first = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.process().await })
    };
    with_timeout(started.wait_for(1)).await;
    with_timeout(c.phases()[0].abort()).await;
    with_timeout(first).await?;

    assert_eq!(aborted.count(), 1);
    assert_eq!(install.count(), 0);
    assert_eq!(c.state(), ControllerState::Aborted);
    assert_eq!(*states.borrow_and_update(), ControllerState::Aborted);
    assert_eq!(c.current_phase(), None);
    assert_eq!(c.completed_runs(), 0);

    let second = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.process().await })
    };
    with_timeout(states.wait_for(|s| *s == ControllerState::Processing)).await?;
    with_timeout(install.wait_for(1)).await;
    assert_eq!(c.current_phase(), Some("Install"));

    gate_tx.send_replace(true);
    with_timeout(second).await?;
    with_timeout(states.wait_for(|s| *s == ControllerState::Idle)).await?;
    assert_eq!(c.completed_runs(), 1);
    Ok(())
}

#[tokio::test]
async fn soft_failure_returns_to_idle_and_skips_later_phases() -> TestResult {
    init_tracing();

    let (build, install) = (Probe::new(), Probe::new());
    let (c, _handle) = controller(
        vec![
            Phase::new("Build", vec![soft_task("build", &build, "type errors")]),
            Phase::new("Install", vec![ok_task("install", &install)]),
        ],
        Phase::new("Cleanup", vec![]),
    );

    with_timeout(c.process()).await;

    assert_eq!(build.count(), 1);
    assert_eq!(install.count(), 0);
    assert_eq!(c.state(), ControllerState::Idle);
    assert_eq!(c.completed_runs(), 0);

    // The next trigger runs again.
    with_timeout(c.process()).await;
    assert_eq!(build.count(), 2);
    Ok(())
}

#[tokio::test]
async fn fatal_error_shuts_the_controller_down() -> TestResult {
    init_tracing();

    let (build, install, cleanup) = (Probe::new(), Probe::new(), Probe::new());
    let (c, handle) = controller(
        vec![
            Phase::new("Build", vec![fatal_task("build", &build, "cannot read package.json")]),
            Phase::new("Install", vec![ok_task("install", &install)]),
        ],
        Phase::new("Cleanup", vec![ok_task("cleanup", &cleanup)]),
    );

    let events = c.start()?;
    with_timeout(handle.wait_subscribed()).await;
    assert!(handle.changed("src/index.ts").await);

    with_timeout(c.wait_stopped()).await;
    with_timeout(events).await?;

    assert_eq!(c.state(), ControllerState::ShuttingDown);
    assert_eq!(install.count(), 0);
    assert_eq!(cleanup.count(), 1);
    assert_eq!(handle.close_count(), 1);

    // Further triggers are ignored.
    with_timeout(c.process()).await;
    assert_eq!(build.count(), 1);
    Ok(())
}

#[tokio::test]
async fn watch_events_trigger_runs() -> TestResult {
    init_tracing();

    let build = Probe::new();
    let (c, handle) = controller(
        vec![Phase::new("Build", vec![ok_task("build", &build)])],
        Phase::new("Cleanup", vec![]),
    );

    let events = c.start()?;
    with_timeout(handle.wait_subscribed()).await;

    assert!(handle.emit(WatchEvent::Ready { files: 3 }).await);
    with_timeout(wait_for_completed_runs(&c, 1)).await;

    assert!(
        handle
            .emit(WatchEvent::Changed {
                paths: vec!["src/a.ts".into(), "src/b.ts".into()],
            })
            .await
    );
    with_timeout(wait_for_completed_runs(&c, 2)).await;
    assert_eq!(build.count(), 2);

    with_timeout(c.stop()).await;
    with_timeout(events).await?;
    assert!(!handle.is_subscribed());
    Ok(())
}
