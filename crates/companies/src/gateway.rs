//! Boundary to the backend authority that owns company records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use partnerdesk_core::CompanyId;

use crate::{CompanyRegistration, CompanyRequest, Outcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure or authority down.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The authority refused the change (e.g. the request is no longer pending).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("company {0} not found")]
    NotFound(CompanyId),

    /// Our credentials were rejected; the session must end.
    #[error("unauthorized")]
    Unauthorized,

    /// The submitted payload was refused field by field.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Reads and transitions onboarding requests at the authority.
#[async_trait::async_trait]
pub trait RequestGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<CompanyRequest>, GatewayError>;

    /// Transition a pending request. Fails with [`GatewayError::Conflict`]
    /// when the authority's copy is no longer pending.
    async fn set_status(
        &self,
        id: &CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    ) -> Result<CompanyRequest, GatewayError>;
}

#[async_trait::async_trait]
impl<G> RequestGateway for Arc<G>
where
    G: RequestGateway + ?Sized,
{
    async fn list(&self) -> Result<Vec<CompanyRequest>, GatewayError> {
        (**self).list().await
    }

    async fn set_status(
        &self,
        id: &CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    ) -> Result<CompanyRequest, GatewayError> {
        (**self).set_status(id, outcome, notes).await
    }
}

/// Acknowledgement of a submitted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub company_id: CompanyId,
    pub message: String,
}

/// Accepts new company registrations; each becomes a pending request.
#[async_trait::async_trait]
pub trait RegistrationIntake: Send + Sync {
    async fn register(&self, registration: CompanyRegistration) -> Result<Receipt, GatewayError>;
}

#[async_trait::async_trait]
impl<I> RegistrationIntake for Arc<I>
where
    I: RegistrationIntake + ?Sized,
{
    async fn register(&self, registration: CompanyRegistration) -> Result<Receipt, GatewayError> {
        (**self).register(registration).await
    }
}

/// Holds the token attached to outgoing authority calls.
pub trait BearerToken: Send + Sync {
    /// `None` drops the token; later calls go out unauthenticated.
    fn set_bearer(&self, token: Option<String>);
}

impl<T> BearerToken for Arc<T>
where
    T: BearerToken + ?Sized,
{
    fn set_bearer(&self, token: Option<String>) {
        (**self).set_bearer(token)
    }
}
