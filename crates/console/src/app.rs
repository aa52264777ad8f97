//! Wiring of the stores behind the operator console.
//!
//! `ConsoleApp` owns one instance of each store and is the only place that
//! crosses between them: it moves the bearer token along with the session,
//! turns store outcomes into notifications and sends every navigation
//! through the [`AuthorizationGate`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;

use partnerdesk_auth::{
    AuthError, AuthorizationGate, Authenticator, Credentials, DemoAuthenticator, GateDecision, Identity, Route,
    SessionStore,
};
use partnerdesk_companies::{
    BearerToken, CompanyRegistration, CompanyRequest, DemoRequestGateway, GatewayError, Outcome, Receipt,
    RegistrationIntake, RequestError, RequestGateway, RequestLifecycleStore,
};
use partnerdesk_core::{CompanyId, InMemoryStore, NotificationId, PersistentStore};
use partnerdesk_notifications::NotificationQueue;

use crate::config::ConsoleConfig;
use crate::store::SqliteStore;
use crate::theme::ThemeStore;

/// External collaborators the console talks to.
pub struct Backend {
    pub authenticator: Arc<dyn Authenticator>,
    pub gateway: Arc<dyn RequestGateway>,
    pub intake: Arc<dyn RegistrationIntake>,
    pub bearer: Arc<dyn BearerToken>,
    pub storage: Arc<dyn PersistentStore>,
}

impl Backend {
    /// In-process authorities with the sample garages.
    pub fn demo(latency: Duration, storage: Arc<dyn PersistentStore>) -> Self {
        let authority = Arc::new(
            DemoRequestGateway::seeded()
                .with_latency(latency)
                .requiring_bearer(),
        );
        Self {
            authenticator: Arc::new(DemoAuthenticator::new().with_latency(latency)),
            gateway: authority.clone(),
            intake: authority.clone(),
            bearer: authority,
            storage,
        }
    }
}

/// What the operator is looking at after a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The session is still resolving; nothing is decided yet.
    Waiting,
    Showing(Route),
}

const MAX_REDIRECTS: usize = 4;

pub struct ConsoleApp {
    session: SessionStore,
    notifications: NotificationQueue,
    requests: RequestLifecycleStore,
    theme: ThemeStore,
    intake: Arc<dyn RegistrationIntake>,
    bearer: Arc<dyn BearerToken>,
    location: Mutex<Route>,
}

impl ConsoleApp {
    pub fn new(backend: Backend, toast_ttl: Duration) -> Self {
        let notifications = NotificationQueue::with_default_ttl(toast_ttl);
        Self {
            session: SessionStore::new(backend.authenticator, backend.storage.clone()),
            requests: RequestLifecycleStore::new(backend.gateway, notifications.clone()),
            theme: ThemeStore::new(backend.storage),
            notifications,
            intake: backend.intake,
            bearer: backend.bearer,
            location: Mutex::new(Route::Root),
        }
    }

    /// Build the demo console described by `config`.
    pub fn from_config(config: &ConsoleConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn PersistentStore> = if config.in_memory {
            Arc::new(InMemoryStore::new())
        } else {
            std::fs::create_dir_all(&config.data_dir)
                .with_context(|| format!("failed to create data directory at {:?}", config.data_dir))?;
            Arc::new(SqliteStore::new(&config.data_dir))
        };
        tracing::info!(
            in_memory = config.in_memory,
            data_dir = %config.data_dir.display(),
            "console configured"
        );
        Ok(Self::new(Backend::demo(config.demo_latency, storage), config.toast_ttl))
    }

    /// Restore persisted state and land on the root route.
    pub async fn start(&self) -> View {
        self.session.restore_session().await;
        self.theme.restore().await;
        self.sync_bearer();
        self.open(Route::Root.path())
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn requests(&self) -> &RequestLifecycleStore {
        &self.requests
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    /// Route currently rendered.
    pub fn location(&self) -> Route {
        *self.location.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Navigate to `path`, following gate redirects until something renders.
    pub fn open(&self, path: &str) -> View {
        let session = self.session.state();
        let mut route = Route::from_path(path);

        for _ in 0..MAX_REDIRECTS {
            match AuthorizationGate::navigate(&session, route) {
                GateDecision::Render => {
                    *self.location.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = route;
                    return View::Showing(route);
                }
                GateDecision::Wait => return View::Waiting,
                GateDecision::Redirect(next) => route = next,
            }
        }

        tracing::warn!(path, "redirect loop; staying on current route");
        View::Showing(self.location())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<View, AuthError> {
        let credentials = Credentials::new(email, password);
        match self.session.login(&credentials).await {
            Ok(identity) => {
                self.bearer.set_bearer(Some(bearer_for(&identity)));
                self.notifications.success("Login successful!");
                Ok(self.open(Route::Root.path()))
            }
            Err(err) => {
                if matches!(err, AuthError::LoginInProgress | AuthError::Cancelled) {
                    return Err(err);
                }
                match &err {
                    AuthError::InvalidCredentials(msg) if !msg.trim().is_empty() => {
                        self.notifications.error(msg.clone());
                    }
                    _ => {
                        self.notifications.error("Login failed");
                    }
                }
                // A failed attempt signs out whoever was signed in before.
                self.sync_bearer();
                self.requests.reset();
                Err(err)
            }
        }
    }

    pub async fn logout(&self) -> View {
        self.bearer.set_bearer(None);
        self.session.logout().await;
        self.requests.reset();
        self.open(Route::Root.path())
    }

    /// Reload the review queue from the authority.
    pub async fn refresh_requests(&self) -> Result<Vec<CompanyRequest>, RequestError> {
        let result = self.requests.load_all().await;
        if let Err(RequestError::Unauthorized) = &result {
            self.end_rejected_session().await;
        }
        result
    }

    pub async fn decide(
        &self,
        id: &CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    ) -> Result<CompanyRequest, RequestError> {
        let result = self.requests.decide(id, outcome, notes).await;
        if let Err(RequestError::Unauthorized) = &result {
            self.end_rejected_session().await;
        }
        result
    }

    /// Submit a company registration. The logo is checked here, once.
    pub async fn register(&self, registration: CompanyRegistration) -> Result<Receipt, GatewayError> {
        if let Err(err) = registration.validate() {
            let message = match err {
                partnerdesk_core::DomainError::Validation(msg) => msg,
                other => other.to_string(),
            };
            self.notifications.error(message.clone());
            return Err(GatewayError::Validation(message));
        }

        match self.intake.register(registration).await {
            Ok(receipt) => {
                self.notifications.success(receipt.message.clone());
                self.open(Route::SignIn.path());
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(error = %err, "registration failed");
                let message = match &err {
                    GatewayError::Validation(msg) | GatewayError::Conflict(msg) => msg.clone(),
                    _ => "Registration failed".to_string(),
                };
                self.notifications.error(message);
                Err(err)
            }
        }
    }

    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.notifications.dismiss(id)
    }

    /// Teardown: drop every pending notification timer.
    pub fn shutdown(&self) {
        self.notifications.clear();
    }

    fn sync_bearer(&self) {
        let token = self.session.state().identity().map(bearer_for);
        self.bearer.set_bearer(token);
    }

    async fn end_rejected_session(&self) {
        self.bearer.set_bearer(None);
        self.requests.reset();
        if self.session.state().is_authenticated() {
            tracing::warn!("authority rejected the session token; signing out");
            self.session.expire().await;
            self.notifications.warning("Your session has expired. Please sign in again.");
        }
        self.open(Route::Root.path());
    }
}

fn bearer_for(identity: &Identity) -> String {
    identity.id.as_str().to_string()
}
