//! Stand-in authority for local runs and tests.

use std::time::Duration;

use chrono::Utc;

use partnerdesk_core::{CompanyId, UserId};

use crate::{AuthError, Authenticator, Credentials, Identity, Role};

const MIN_PASSWORD_LEN: usize = 6;

/// Accepts any password of at least six characters.
///
/// The role is derived from the email: addresses containing `admin` sign in
/// as administrators, everything else as the representative of company `1`.
#[derive(Debug, Clone, Default)]
pub struct DemoAuthenticator {
    latency: Duration,
}

impl DemoAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a slow authority.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait::async_trait]
impl Authenticator for DemoAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if credentials.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidCredentials("Invalid credentials".to_string()));
        }

        let is_admin = credentials.email.contains("admin");
        let now = Utc::now();

        Ok(Identity {
            id: UserId::new("1"),
            email: credentials.email.clone(),
            name: if is_admin { "Admin User" } else { "Company User" }.to_string(),
            role: if is_admin { Role::Admin } else { Role::Company },
            company_id: (!is_admin).then(|| CompanyId::new("1")),
            avatar: None,
            created_at: now,
            updated_at: now,
        })
    }
}
