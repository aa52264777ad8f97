//! Subscription handle for store change notifications.
//!
//! A subscription receives every snapshot published after it was created, in
//! publication order. Stores publish from inside their own operations, so a
//! subscriber never observes a half-applied mutation.

use std::sync::mpsc::Receiver;

/// A subscription to a store's change feed.
///
/// ## Usage Pattern
///
/// ```ignore
/// let changes = session.subscribe();
/// // ... perform operations ...
/// while let Ok(state) = changes.try_recv() {
///     render(&state);
/// }
/// ```
///
/// Snapshots are plain values; a slow subscriber only delays itself. Use
/// [`Subscription::latest`] to skip straight to the most recent state.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a snapshot without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything queued so far and return the newest snapshot, if any.
    pub fn latest(&self) -> Option<M> {
        let mut last = None;
        while let Ok(message) = self.receiver.try_recv() {
            last = Some(message);
        }
        last
    }

    /// Drain everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}
