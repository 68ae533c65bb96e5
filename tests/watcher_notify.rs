// tests/watcher_notify.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use sympack::config::WatchSection;
use sympack::watch::{FileChangeSource, NotifySource, WatchEvent};

type TestResult = Result<(), Box<dyn Error>>;

fn section(use_hash: bool) -> WatchSection {
    WatchSection {
        debounce_ms: 100,
        use_hash,
        ..WatchSection::default()
    }
}

async fn next_event(rx: &mut mpsc::Receiver<WatchEvent>) -> Option<WatchEvent> {
    timeout(Duration::from_secs(10), rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn reports_ready_then_debounced_changes() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/index.ts"), "export {}")?;
    fs::write(dir.path().join("src/notes.md"), "# notes")?;

    let source = NotifySource::from_section(dir.path(), &section(false))?;
    let (tx, mut rx) = mpsc::channel(16);
    let subscription = source.subscribe(tx)?;

    assert_eq!(next_event(&mut rx).await, Some(WatchEvent::Ready { files: 1 }));

    // Let the backend settle before producing events.
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(dir.path().join("src/a.ts"), "export const a = 1;")?;
    fs::write(dir.path().join("src/b.ts"), "export const b = 2;")?;

    match next_event(&mut rx).await {
        Some(WatchEvent::Changed { paths }) => {
            assert!(paths.iter().all(|p| p.starts_with("src/") && p.ends_with(".ts")));
            assert!(!paths.is_empty());
        }
        other => panic!("expected Changed, got {other:?}"),
    }

    subscription.close();
    Ok(())
}

#[tokio::test]
async fn unchanged_content_is_ignored_with_hashing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    let file = dir.path().join("src/index.ts");
    fs::write(&file, "export {}")?;

    let source = NotifySource::from_section(dir.path(), &section(true))?;
    let (tx, mut rx) = mpsc::channel(16);
    let subscription = source.subscribe(tx)?;

    assert_eq!(next_event(&mut rx).await, Some(WatchEvent::Ready { files: 1 }));
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Same bytes: no event.
    fs::write(&file, "export {}")?;
    let quiet = timeout(Duration::from_millis(600), rx.recv()).await;
    assert!(quiet.is_err(), "touch-save must not be reported");

    fs::write(&file, "export const changed = true;")?;
    assert_eq!(
        next_event(&mut rx).await,
        Some(WatchEvent::Changed {
            paths: vec!["src/index.ts".to_string()],
        })
    );

    subscription.close();
    Ok(())
}

#[tokio::test]
async fn node_modules_is_not_watched() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::create_dir_all(dir.path().join("node_modules/dep"))?;
    fs::write(dir.path().join("src/index.ts"), "export {}")?;

    let section = WatchSection {
        paths: vec!["**/*".to_string()],
        ..section(false)
    };
    let source = NotifySource::from_section(dir.path(), &section)?;
    let (tx, mut rx) = mpsc::channel(16);
    let subscription = source.subscribe(tx)?;

    assert_eq!(next_event(&mut rx).await, Some(WatchEvent::Ready { files: 1 }));
    tokio::time::sleep(Duration::from_millis(200)).await;

    fs::write(dir.path().join("node_modules/dep/index.ts"), "export {}")?;
    let quiet = timeout(Duration::from_millis(600), rx.recv()).await;
    assert!(quiet.is_err(), "changes under node_modules must not be reported");

    fs::write(dir.path().join("src/a.ts"), "export const a = 1;")?;
    assert_eq!(
        next_event(&mut rx).await,
        Some(WatchEvent::Changed {
            paths: vec!["src/a.ts".to_string()],
        })
    );

    subscription.close();
    Ok(())
}
