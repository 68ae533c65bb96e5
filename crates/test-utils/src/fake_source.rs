use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sympack::errors::Result;
use sympack::watch::{FileChangeSource, WatchEvent, WatchSubscription};
use tokio::sync::{mpsc, watch};

#[derive(Debug)]
struct Shared {
    sender: Mutex<Option<mpsc::Sender<WatchEvent>>>,
    subscribed: watch::Sender<bool>,
    closes: AtomicUsize,
}

/// A file-change source driven by the test through a [`FakeSourceHandle`].
#[derive(Debug)]
pub struct FakeSource {
    shared: Arc<Shared>,
}

/// Test-side handle of a [`FakeSource`].
#[derive(Debug, Clone)]
pub struct FakeSourceHandle {
    shared: Arc<Shared>,
}

impl FakeSource {
    pub fn new() -> (Self, FakeSourceHandle) {
        let (subscribed, _rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            sender: Mutex::new(None),
            subscribed,
            closes: AtomicUsize::new(0),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            FakeSourceHandle { shared },
        )
    }
}

impl FileChangeSource for FakeSource {
    fn subscribe(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Box<dyn WatchSubscription>> {
        *self.shared.sender.lock().unwrap() = Some(tx);
        self.shared.subscribed.send_replace(true);
        Ok(Box::new(FakeSubscription {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeSubscription {
    shared: Arc<Shared>,
}

impl WatchSubscription for FakeSubscription {
    fn close(self: Box<Self>) {
        self.shared.sender.lock().unwrap().take();
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeSourceHandle {
    /// Deliver an event. Returns `false` if nobody is subscribed.
    pub async fn emit(&self, event: WatchEvent) -> bool {
        let sender = self.shared.sender.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub async fn changed(&self, path: &str) -> bool {
        self.emit(WatchEvent::Changed {
            paths: vec![path.to_string()],
        })
        .await
    }

    pub async fn wait_subscribed(&self) {
        let mut rx = self.shared.subscribed.subscribe();
        let _ = rx.wait_for(|s| *s).await;
    }

    /// How many times the subscription has been closed.
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.sender.lock().unwrap().is_some()
    }
}
