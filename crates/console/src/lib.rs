//! `partnerdesk-console` - the operator console: configuration, storage and
//! the wiring that ties sessions, notifications and the review queue together.

pub mod app;
pub mod commands;
pub mod config;
pub mod store;
pub mod theme;

pub use app::{Backend, ConsoleApp, View};
pub use commands::{Command, ParseError, Reply, execute};
pub use config::ConsoleConfig;
pub use store::SqliteStore;
pub use theme::{ThemePreferences, ThemeStore};
