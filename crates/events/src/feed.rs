//! In-process broadcaster behind every store's `subscribe()`.

use std::sync::{Mutex, mpsc};

use crate::bus::Subscription;

/// Broadcast snapshots to any number of subscribers.
///
/// - No IO / no async
/// - Dead subscribers are dropped on the next publish
/// - Publishing never fails from the caller's point of view
#[derive(Debug)]
pub struct ChangeFeed<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> ChangeFeed<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> Default for ChangeFeed<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> ChangeFeed<M>
where
    M: Clone + Send + 'static,
{
    pub fn publish(&self, message: M) {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(_) => {
                tracing::warn!("change feed lock poisoned; dropping notification");
                return;
            }
        };

        subs.retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still hands out a subscription; it just stays silent.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
