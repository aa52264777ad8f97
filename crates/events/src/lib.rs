//! `partnerdesk-events` - change notification mechanics for the console stores.
//!
//! Every store publishes a snapshot of its state after each mutation; views
//! subscribe and re-render from the latest snapshot they receive.

pub mod bus;
pub mod feed;

pub use bus::Subscription;
pub use feed::ChangeFeed;
