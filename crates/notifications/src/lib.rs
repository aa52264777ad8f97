//! `partnerdesk-notifications` - transient user-facing messages ("toasts").
//!
//! This is the single presentation channel for transient errors and
//! confirmations. Each entry expires on its own timer unless it is sticky.

pub mod entry;
pub mod queue;

pub use entry::{NotificationEntry, Severity};
pub use queue::{DEFAULT_TTL, NotificationQueue};
