// tests/task_cancellation.rs

mod common;
use crate::common::{Probe, blocking_task, init_tracing, ok_task, task, with_timeout};

use std::error::Error;
use std::sync::Arc;

use sympack::engine::{TaskError, TaskResult};
use sympack::exec::{CommandOutput, ExecError};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancelled_before_execute_skips_operation() -> TestResult {
    init_tracing();

    let probe = Probe::new();
    let t = ok_task("noop", &probe);

    t.abort();
    assert!(t.is_cancelled());

    let result = t.execute().await;
    assert_eq!(result, Err(TaskError::Abort));
    assert_eq!(probe.count(), 0, "operation must not run");

    // The consumed token is replaced, so the task is usable again.
    assert!(!t.is_cancelled());
    assert_eq!(t.execute().await, Ok(None));
    assert_eq!(probe.count(), 1);

    Ok(())
}

#[tokio::test]
async fn abort_during_execution_unwinds_and_task_is_reusable() -> TestResult {
    init_tracing();

    let started = Probe::new();
    let aborted = Probe::new();
    let t = Arc::new(blocking_task("wait", &started, &aborted));

    for round in 1..=2 {
        let runner = Arc::clone(&t);
        let handle = tokio::spawn(async move { runner.execute().await });

        with_timeout(started.wait_for(round)).await;
        t.abort();

        let result = with_timeout(handle).await?;
        assert_eq!(result, Err(TaskError::Abort));
        assert_eq!(aborted.count(), round);
        assert!(!t.is_cancelled(), "token should be fresh after an abort");
    }

    Ok(())
}

#[tokio::test]
async fn success_note_is_passed_through() -> TestResult {
    let probe = Probe::new();
    let t = task("build", &probe, Ok(Some("Project built".to_string())));

    let result: TaskResult = t.execute().await;
    assert_eq!(result, Ok(Some("Project built".to_string())));
    assert_eq!(t.message(), "build");
    Ok(())
}

#[test]
fn exec_errors_are_classified() {
    let cancelled = ExecError::Cancelled {
        program: "npm".into(),
    };
    assert!(TaskError::from(cancelled).is_abort());

    let failed = ExecError::Failed {
        program: "npm".into(),
        output: CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "npm ERR! boom\n".into(),
        },
    };
    match TaskError::from(failed) {
        TaskError::Soft(msg) => {
            assert!(msg.contains("npm"));
            assert!(msg.contains("boom"));
        }
        other => panic!("expected soft error, got {other:?}"),
    }

    let spawn = ExecError::Spawn {
        program: "tsc".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    };
    assert!(matches!(TaskError::from(spawn), TaskError::Soft(_)));
}
