// src/watch/source.rs

//! Boundary between the controller and whatever produces change events.
//!
//! The controller only needs "something is ready" and "something changed";
//! production uses [`NotifySource`](crate::watch::NotifySource), tests plug in
//! a fake that emits events on demand.

use tokio::sync::mpsc;

use crate::errors::Result;

/// Event emitted by a [`FileChangeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Initial scan finished; emitted once per subscription.
    Ready { files: usize },
    /// Debounced modification inside the watch set.
    ///
    /// `paths` are relative to the watch root and only informational.
    Changed { paths: Vec<String> },
}

/// Something that can be subscribed to for [`WatchEvent`]s.
pub trait FileChangeSource: Send + Sync {
    /// Resolve the watch set, start watching and deliver events into `tx`.
    ///
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Box<dyn WatchSubscription>>;
}

/// Live subscription; closing it stops event delivery.
pub trait WatchSubscription: Send {
    fn close(self: Box<Self>);
}
