// src/watch/watcher.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::config::WatchSection;
use crate::errors::{Result, SympackError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::hash::ContentHashes;
use crate::watch::patterns::{WatchPatterns, collect_matching_files, is_skipped_dir};
use crate::watch::source::{FileChangeSource, WatchEvent, WatchSubscription};

/// [`FileChangeSource`] backed by `notify` watchers on the base directories of
/// the watch globs.
///
/// Events are filtered through [`WatchPatterns`] and debounced: a `Changed`
/// event is emitted once no matching event has arrived for `debounce`.
pub struct NotifySource {
    root: PathBuf,
    patterns: WatchPatterns,
    debounce: Duration,
    use_hash: bool,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySource")
            .field("root", &self.root)
            .field("patterns", &self.patterns)
            .field("debounce", &self.debounce)
            .field("use_hash", &self.use_hash)
            .finish()
    }
}

impl NotifySource {
    pub fn new(root: impl Into<PathBuf>, patterns: WatchPatterns, debounce: Duration) -> Self {
        let root = root.into();
        // Canonicalize once so we have a stable base path.
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            patterns,
            debounce,
            use_hash: false,
            fs: Arc::new(RealFileSystem),
        }
    }

    pub fn from_section(root: impl Into<PathBuf>, section: &WatchSection) -> Result<Self> {
        let patterns = WatchPatterns::from_section(section).map_err(SympackError::Other)?;
        Ok(Self::new(root, patterns, Duration::from_millis(section.debounce_ms)).with_hash(section.use_hash))
    }

    pub fn with_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileChangeSource for NotifySource {
    fn subscribe(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Box<dyn WatchSubscription>> {
        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // Receiver gone means the subscription is closing.
                    let _ = event_tx.send(event);
                }
                Err(err) => {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("sympack: file watch error: {err}");
                }
            },
            Config::default(),
        )?;
        let watched = self.register_watches(&mut watcher)?;
        info!(root = %self.root.display(), watched, "file watcher started");

        let worker = WatchWorker {
            root: self.root.clone(),
            patterns: self.patterns.clone(),
            debounce: self.debounce,
            hashes: self.use_hash.then(ContentHashes::new),
            fs: Arc::clone(&self.fs),
        };
        let handle = tokio::spawn(worker.run(event_rx, tx));

        Ok(Box::new(NotifySubscription {
            _watcher: watcher,
            handle,
        }))
    }
}

impl NotifySource {
    /// Watch each glob base directory recursively. A glob rooted at the
    /// package root watches the root itself non-recursively plus every
    /// top-level directory except `node_modules` and dot-directories.
    ///
    /// Returns the number of watches registered. Base directories that do
    /// not exist yet are skipped.
    fn register_watches(&self, watcher: &mut RecommendedWatcher) -> Result<usize> {
        let mut watched = 0;
        for base in self.patterns.base_dirs() {
            if base.is_empty() {
                watcher.watch(&self.root, RecursiveMode::NonRecursive)?;
                watched += 1;
                for path in self.fs.read_dir(&self.root).map_err(SympackError::Other)? {
                    if self.fs.is_dir(&path) && !is_skipped_dir(&path) {
                        watcher.watch(&path, RecursiveMode::Recursive)?;
                        watched += 1;
                    }
                }
                continue;
            }

            let dir = self.root.join(&base);
            if self.fs.is_dir(&dir) {
                watcher.watch(&dir, RecursiveMode::Recursive)?;
                watched += 1;
            } else {
                warn!(dir = %dir.display(), "watch directory does not exist; skipping");
            }
        }
        debug!(watched, "registered file watches");
        Ok(watched)
    }
}

/// Keeps the `RecommendedWatcher` alive; dropping it stops file watching.
struct NotifySubscription {
    _watcher: RecommendedWatcher,
    handle: JoinHandle<()>,
}

impl WatchSubscription for NotifySubscription {
    fn close(self: Box<Self>) {
        self.handle.abort();
    }
}

struct WatchWorker {
    root: PathBuf,
    patterns: WatchPatterns,
    debounce: Duration,
    hashes: Option<ContentHashes>,
    fs: Arc<dyn FileSystem>,
}

impl WatchWorker {
    async fn run(
        mut self,
        mut event_rx: mpsc::UnboundedReceiver<Event>,
        tx: mpsc::Sender<WatchEvent>,
    ) {
        let files = self.initial_scan().await;
        if tx.send(WatchEvent::Ready { files }).await.is_err() {
            return;
        }

        let mut pending: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + self.debounce);
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    if self.collect(event, &mut pending) {
                        deadline = Some(Instant::now() + self.debounce);
                    }
                }
                _ = sleep_until(wake_at), if deadline.is_some() => {
                    deadline = None;
                    let paths = self.changed_paths(std::mem::take(&mut pending));
                    if paths.is_empty() {
                        continue;
                    }
                    debug!(count = paths.len(), "emitting debounced change");
                    if tx.send(WatchEvent::Changed { paths }).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    }

    async fn initial_scan(&mut self) -> usize {
        let fs = Arc::clone(&self.fs);
        let root = self.root.clone();
        let patterns = self.patterns.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            collect_matching_files(fs.as_ref(), &root, &patterns)
        })
        .await;

        let files = match scanned {
            Ok(Ok(files)) => files,
            Ok(Err(err)) => {
                warn!(error = %err, "initial scan failed");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "initial scan task failed");
                Vec::new()
            }
        };

        if let Some(hashes) = self.hashes.as_mut() {
            hashes.seed(self.fs.as_ref(), &files);
        }
        files.len()
    }

    /// Add the event's matching paths to `pending`. Returns `true` if any
    /// path matched.
    fn collect(&self, event: Event, pending: &mut BTreeMap<String, PathBuf>) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }

        let mut any = false;
        for path in event.paths {
            if let Some(rel) = self.patterns.matches_path(&self.root, &path) {
                pending.insert(rel, path);
                any = true;
            }
        }
        any
    }

    /// Relative paths whose content differs from what was last seen.
    ///
    /// Hashes are taken once the burst has settled, so a file caught half
    /// written is never compared.
    fn changed_paths(&mut self, pending: BTreeMap<String, PathBuf>) -> Vec<String> {
        let Some(hashes) = self.hashes.as_mut() else {
            return pending.into_keys().collect();
        };

        pending
            .into_iter()
            .filter_map(|(rel, path)| {
                if hashes.has_changed(self.fs.as_ref(), &path) {
                    Some(rel)
                } else {
                    debug!(path = %rel, "content unchanged; ignoring");
                    None
                }
            })
            .collect()
    }
}
