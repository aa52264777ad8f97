//! `partnerdesk-auth` - session state and route admission for the console.
//!
//! The authority that checks passwords lives behind [`Authenticator`]; this
//! crate only tracks who is signed in and decides what they may see.

pub mod authenticator;
pub mod authorize;
pub mod demo;
pub mod identity;
pub mod roles;
pub mod session;

pub use authenticator::{AuthError, Authenticator};
pub use authorize::{AuthorizationGate, GateDecision, Route};
pub use demo::DemoAuthenticator;
pub use identity::{Credentials, Identity};
pub use roles::Role;
pub use session::{SESSION_STORAGE_KEY, SessionState, SessionStore};
