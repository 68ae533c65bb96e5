// src/engine/cancel.rs

//! Single-use cooperative cancellation token.

use std::sync::Arc;

use tokio::sync::watch;

/// A flag that can be raised once and awaited by whoever is doing the work.
///
/// Clones share the same flag. A raised token stays raised; the owning
/// [`Task`](crate::engine::Task) swaps in a fresh token instead of resetting
/// this one, so nobody holding an old clone ever sees it "un-cancel".
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { inner: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent and non-blocking.
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Resolve once cancellation has been requested.
    ///
    /// Intended for `tokio::select!` next to the blocking operation.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Whether two handles refer to the same underlying flag.
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
