use std::sync::Arc;

use thiserror::Error;

use crate::{Credentials, Identity};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The authority refused the credentials. The message is user-facing.
    #[error("{0}")]
    InvalidCredentials(String),

    /// A login is already running; the new attempt was not started.
    #[error("a sign-in is already in progress")]
    LoginInProgress,

    /// A logout happened while the sign-in was in flight; its result was discarded.
    #[error("sign-in was cancelled")]
    Cancelled,

    /// The authority could not be reached.
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

/// The remote authority that verifies credentials and issues identities.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
}

#[async_trait::async_trait]
impl<A> Authenticator for Arc<A>
where
    A: Authenticator + ?Sized,
{
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        (**self).authenticate(credentials).await
    }
}
