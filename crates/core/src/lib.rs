//! `partnerdesk-core` - shared building blocks for the operator console.
//!
//! Identifiers, the domain error model and the key/value persistence seam.
//! Nothing in here knows about sessions, requests or notifications.

pub mod error;
pub mod id;
pub mod persist;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, NotificationId, UserId};
pub use persist::{InMemoryStore, PersistentStore};
