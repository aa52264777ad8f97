//! Queue of live notifications with one single-shot expiry timer per entry.
//!
//! Entries are kept in creation order, oldest first. Removal is always by id.
//!
//! Every entry with a non-zero ttl owns exactly one timer task for its whole
//! lifetime. The timer is released exactly once: by expiry (the task removes
//! its own entry) or by an explicit dismiss (which aborts the task). Both
//! paths go through the same removal under one lock, so whichever arrives
//! second finds nothing and does nothing.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use partnerdesk_core::NotificationId;
use partnerdesk_events::{ChangeFeed, Subscription};

use crate::{NotificationEntry, Severity};

/// Default lifetime of a notification.
pub const DEFAULT_TTL: Duration = Duration::from_millis(4000);

struct Slot {
    entry: NotificationEntry,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Shared {
    slots: Mutex<Vec<Slot>>,
    changes: ChangeFeed<Vec<NotificationEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Dismissed,
    Expired,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(slots: &[Slot]) -> Vec<NotificationEntry> {
        slots.iter().map(|slot| slot.entry.clone()).collect()
    }

    fn remove(&self, id: NotificationId, how: Removal) -> bool {
        let (removed, snapshot) = {
            let mut slots = self.lock();
            let Some(pos) = slots.iter().position(|slot| slot.entry.id == id) else {
                return false;
            };
            let slot = slots.remove(pos);
            (slot, Self::snapshot(&slots))
        };

        if let Some(timer) = removed.timer {
            // An expiring timer is the running task itself; it just finishes.
            if how == Removal::Dismissed {
                timer.abort();
            }
        }

        tracing::debug!(id = %id, ?how, "notification removed");
        self.changes.publish(snapshot);
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for slot in slots.drain(..) {
            if let Some(timer) = slot.timer {
                timer.abort();
            }
        }
    }
}

/// Process-wide notification queue.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
    default_ttl: Duration,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    /// Queue whose shorthand helpers use `default_ttl`.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            default_ttl,
        }
    }

    /// Show a message and, unless `ttl` is zero, arm its expiry timer.
    ///
    /// Timers run on the ambient tokio runtime. Called outside a runtime, a
    /// non-sticky entry cannot expire on its own and is kept until dismissed.
    pub fn show(&self, text: impl Into<String>, severity: Severity, ttl: Duration) -> NotificationId {
        let entry = NotificationEntry {
            id: NotificationId::new(),
            text: text.into(),
            severity,
            ttl,
        };
        let id = entry.id;

        let snapshot = {
            let mut slots = self.shared.lock();
            // Spawned while holding the lock: the task cannot reach `remove`
            // before its handle is stored.
            let timer = if ttl.is_zero() {
                None
            } else {
                self.arm_timer(id, ttl)
            };
            slots.push(Slot { entry, timer });
            Shared::snapshot(&slots)
        };

        tracing::debug!(id = %id, %severity, ttl_ms = ttl.as_millis() as u64, "notification shown");
        self.shared.changes.publish(snapshot);
        id
    }

    /// Show with the default ttl.
    pub fn notify(&self, text: impl Into<String>, severity: Severity) -> NotificationId {
        self.show(text, severity, self.default_ttl)
    }

    pub fn success(&self, text: impl Into<String>) -> NotificationId {
        self.notify(text, Severity::Success)
    }

    pub fn error(&self, text: impl Into<String>) -> NotificationId {
        self.notify(text, Severity::Error)
    }

    pub fn warning(&self, text: impl Into<String>) -> NotificationId {
        self.notify(text, Severity::Warning)
    }

    pub fn info(&self, text: impl Into<String>) -> NotificationId {
        self.notify(text, Severity::Info)
    }

    /// Remove an entry. Returns whether anything was removed; a second call
    /// (or a call racing the expiry timer) is a no-op.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.shared.remove(id, Removal::Dismissed)
    }

    /// Remove everything, releasing every pending timer.
    pub fn clear(&self) {
        let drained: Vec<Slot> = {
            let mut slots = self.shared.lock();
            slots.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        for slot in drained {
            if let Some(timer) = slot.timer {
                timer.abort();
            }
        }
        self.shared.changes.publish(Vec::new());
    }

    /// Live entries, oldest first.
    pub fn entries(&self) -> Vec<NotificationEntry> {
        Shared::snapshot(&self.shared.lock())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of expiry timers still pending.
    pub fn active_timers(&self) -> usize {
        self.shared
            .lock()
            .iter()
            .filter(|slot| slot.timer.as_ref().is_some_and(|timer| !timer.is_finished()))
            .count()
    }

    pub fn subscribe(&self) -> Subscription<Vec<NotificationEntry>> {
        self.shared.changes.subscribe()
    }

    fn arm_timer(&self, id: NotificationId, ttl: Duration) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(id = %id, "no async runtime; notification will not auto-dismiss");
                return None;
            }
        };

        // Weak: a pending timer must not keep a dropped queue alive.
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(shared) = shared.upgrade() {
                shared.remove(id, Removal::Expired);
            }
        }))
    }
}
