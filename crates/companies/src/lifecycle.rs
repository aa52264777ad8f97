//! Write-after-confirm cache of onboarding requests.
//!
//! The local list is a read-through, write-through copy of the authority's
//! records. A decision is applied locally only after the gateway confirmed
//! it; a failed call leaves the cache exactly as it was, so the pending
//! actions are offered again.
//!
//! Re-entrant triggers are ignored rather than queued: a second load while
//! one is running, or a second decision for a request whose decision is in
//! flight, fails immediately without touching anything.
//!
//! A [`RequestLifecycleStore::reset`] outranks anything still in flight:
//! results that arrive afterwards are returned to their caller but never
//! written back into the cache.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use partnerdesk_core::CompanyId;
use partnerdesk_events::{ChangeFeed, Subscription};
use partnerdesk_notifications::NotificationQueue;

use crate::company::normalize_notes;
use crate::{CompanyRequest, GatewayError, Outcome, RequestGateway, RequestStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The request has left `pending`; terminal states never transition.
    #[error("request {id} is already {from}; cannot mark it {to}")]
    InvalidStateTransition {
        id: CompanyId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("request {0} not found")]
    NotFound(CompanyId),

    #[error("a decision for request {0} is already in flight")]
    DecisionInProgress(CompanyId),

    #[error("requests are already loading")]
    LoadInProgress,

    /// The authority refused the change (its copy moved on).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The authority rejected our credentials; the session must end.
    #[error("not authorized")]
    Unauthorized,
}

impl RequestError {
    fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => RequestError::GatewayUnavailable(msg),
            GatewayError::Conflict(msg) => RequestError::Conflict(msg),
            GatewayError::NotFound(id) => RequestError::NotFound(id),
            GatewayError::Unauthorized => RequestError::Unauthorized,
            GatewayError::Validation(msg) => RequestError::Conflict(msg),
        }
    }
}

/// Snapshot published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestsState {
    pub requests: Vec<CompanyRequest>,
    pub loading: bool,
    /// Requests whose decision is awaiting the authority.
    pub in_flight: BTreeSet<CompanyId>,
}

impl RequestsState {
    pub fn get(&self, id: &CompanyId) -> Option<&CompanyRequest> {
        self.requests.iter().find(|r| r.id() == id)
    }

    /// Whether approve/reject should be offered for this request.
    pub fn can_decide(&self, id: &CompanyId) -> bool {
        self.get(id).is_some_and(|r| r.is_pending()) && !self.in_flight.contains(id)
    }

    pub fn count_by_status(&self, status: RequestStatus) -> usize {
        self.requests.iter().filter(|r| r.status() == status).count()
    }
}

pub struct RequestLifecycleStore {
    state: Mutex<RequestsState>,
    /// Bumped by every reset, always while `state` is locked.
    generation: AtomicU64,
    gateway: Arc<dyn RequestGateway>,
    notifications: NotificationQueue,
    changes: ChangeFeed<RequestsState>,
}

impl RequestLifecycleStore {
    pub fn new(gateway: Arc<dyn RequestGateway>, notifications: NotificationQueue) -> Self {
        Self {
            state: Mutex::new(RequestsState::default()),
            generation: AtomicU64::new(0),
            gateway,
            notifications,
            changes: ChangeFeed::new(),
        }
    }

    pub fn state(&self) -> RequestsState {
        self.lock().clone()
    }

    pub fn requests(&self) -> Vec<CompanyRequest> {
        self.lock().requests.clone()
    }

    pub fn subscribe(&self) -> Subscription<RequestsState> {
        self.changes.subscribe()
    }

    /// Replace the cache with the authority's list.
    ///
    /// On failure the previous list stays untouched and exactly one error
    /// notification is shown.
    pub async fn load_all(&self) -> Result<Vec<CompanyRequest>, RequestError> {
        let started = self.update(|state| {
            if state.loading {
                return false;
            }
            state.loading = true;
            true
        });
        if !started {
            return Err(RequestError::LoadInProgress);
        }
        let mut guard = InFlight::load(self);

        match self.gateway.list().await {
            Ok(requests) => {
                tracing::info!(count = requests.len(), "company requests loaded");
                let loaded = requests.clone();
                if !guard.finish(move |state| state.requests = loaded) {
                    tracing::info!("cache was reset while loading; list not kept");
                }
                Ok(requests)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load company requests; keeping cached list");
                guard.finish(|_| {});
                self.notifications.error("Failed to fetch company requests");
                Err(RequestError::from_gateway(err))
            }
        }
    }

    /// Approve or reject a pending request.
    ///
    /// The cache changes only after the gateway confirms. Invalid transitions
    /// and gateway failures surface as one error notification; a duplicate
    /// trigger while the same decision is in flight is ignored silently.
    pub async fn decide(
        &self,
        id: &CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    ) -> Result<CompanyRequest, RequestError> {
        let precheck = self.update(|state| {
            if state.in_flight.contains(id) {
                return Err(RequestError::DecisionInProgress(id.clone()));
            }
            let Some(current) = state.get(id) else {
                return Err(RequestError::NotFound(id.clone()));
            };
            if current.ensure_can_decide(outcome).is_err() {
                return Err(RequestError::InvalidStateTransition {
                    id: id.clone(),
                    from: current.status(),
                    to: outcome.status(),
                });
            }
            state.in_flight.insert(id.clone());
            Ok(())
        });

        if let Err(err) = precheck {
            match &err {
                RequestError::DecisionInProgress(_) => {
                    tracing::debug!(id = %id, "ignoring duplicate decision trigger");
                }
                _ => {
                    tracing::warn!(id = %id, error = %err, "decision refused locally");
                    self.notifications.error(format!("Failed to {} company: {}", outcome.verb(), err));
                }
            }
            return Err(err);
        }
        let mut guard = InFlight::decision(self, id.clone());

        let notes = normalize_notes(notes);
        let confirmed = self
            .gateway
            .set_status(id, outcome, notes)
            .await
            .map_err(RequestError::from_gateway)
            .and_then(|record| {
                if record.id() == id && record.status() == outcome.status() {
                    Ok(record)
                } else {
                    Err(RequestError::GatewayUnavailable(format!(
                        "authority answered with {} in state {}",
                        record.id(),
                        record.status()
                    )))
                }
            });

        match confirmed {
            Ok(record) => {
                tracing::info!(id = %id, %outcome, "decision confirmed");
                let cached = record.clone();
                if !guard.finish(move |state| {
                    if let Some(slot) = state.requests.iter_mut().find(|r| r.id() == cached.id()) {
                        *slot = cached;
                    }
                }) {
                    tracing::info!(id = %id, "cache was reset while deciding; confirmation not cached");
                }
                let done = match outcome {
                    Outcome::Approved => "approved",
                    Outcome::Rejected => "rejected",
                };
                self.notifications.success(format!("Company {done} successfully"));
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(id = %id, %outcome, error = %err, "decision failed; cache unchanged");
                guard.finish(|_| {});
                self.notifications.error(format!("Failed to {} company", outcome.verb()));
                Err(err)
            }
        }
    }

    /// Forget the cached list (e.g. on sign-out). Running operations keep
    /// their in-flight markers until they finish.
    pub fn reset(&self) {
        self.update(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.requests.clear();
        });
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, RequestsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<R>(&self, f: impl FnOnce(&mut RequestsState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.lock();
            let result = f(&mut state);
            (result, state.clone())
        };
        self.changes.publish(snapshot);
        result
    }
}

/// Marks a load or a single decision as running and un-marks it on every
/// exit path, including a dropped future.
struct InFlight<'a> {
    store: &'a RequestLifecycleStore,
    decision: Option<CompanyId>,
    generation: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn load(store: &'a RequestLifecycleStore) -> Self {
        Self {
            store,
            decision: None,
            generation: store.generation(),
            armed: true,
        }
    }

    fn decision(store: &'a RequestLifecycleStore, id: CompanyId) -> Self {
        Self {
            store,
            decision: Some(id),
            generation: store.generation(),
            armed: true,
        }
    }

    /// Release the marker and apply `f` unless a reset happened since the
    /// operation started. Returns whether `f` ran.
    fn finish(&mut self, f: impl FnOnce(&mut RequestsState)) -> bool {
        self.armed = false;
        let decision = self.decision.take();
        let generation = self.generation;
        self.store.update(|state| {
            let current = self.store.generation() == generation;
            if current {
                f(state);
            }
            release(state, decision);
            current
        })
    }
}

fn release(state: &mut RequestsState, decision: Option<CompanyId>) {
    match decision {
        Some(id) => {
            state.in_flight.remove(&id);
        }
        None => state.loading = false,
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let decision = self.decision.take();
            self.store.update(|state| release(state, decision));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use partnerdesk_notifications::Severity;

    use super::*;
    use crate::DemoRequestGateway;

    async fn loaded_store(gateway: Arc<DemoRequestGateway>) -> (RequestLifecycleStore, NotificationQueue) {
        let notifications = NotificationQueue::new();
        let store = RequestLifecycleStore::new(gateway, notifications.clone());
        store.load_all().await.unwrap();
        (store, notifications)
    }

    fn errors(queue: &NotificationQueue) -> usize {
        queue
            .entries()
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    #[tokio::test]
    async fn load_all_fills_the_cache() {
        let (store, notifications) = loaded_store(Arc::new(DemoRequestGateway::seeded())).await;
        let state = store.state();
        assert_eq!(state.requests.len(), 3);
        assert!(!state.loading);
        assert_eq!(state.count_by_status(RequestStatus::Pending), 1);
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_list_and_notifies_once() {
        let gateway = Arc::new(DemoRequestGateway::seeded());
        let (store, notifications) = loaded_store(gateway.clone()).await;
        let before = store.requests();

        gateway.fail_next(GatewayError::Unavailable("connection refused".into()));
        let err = store.load_all().await.unwrap_err();

        assert_eq!(err, RequestError::GatewayUnavailable("connection refused".into()));
        assert_eq!(store.requests(), before);
        assert_eq!(store.requests().len(), 3);
        assert_eq!(errors(&notifications), 1);
        assert_eq!(notifications.entries()[0].text, "Failed to fetch company requests");
        assert!(!store.state().loading);
    }

    #[tokio::test]
    async fn approve_updates_cache_after_confirmation() {
        let (store, notifications) = loaded_store(Arc::new(DemoRequestGateway::seeded())).await;
        let id = CompanyId::new("1");

        let confirmed = store
            .decide(&id, Outcome::Approved, Some("looks good".into()))
            .await
            .unwrap();

        assert_eq!(confirmed.status(), RequestStatus::Approved);
        let cached = store.state().get(&id).cloned().unwrap();
        assert_eq!(cached, confirmed);
        assert_eq!(cached.admin_notes(), Some("looks good"));
        assert!(cached.reviewed_at().is_some());
        assert_eq!(notifications.entries()[0].text, "Company approved successfully");
    }

    #[tokio::test]
    async fn deciding_a_terminal_request_fails_without_mutation() {
        let (store, notifications) = loaded_store(Arc::new(DemoRequestGateway::seeded())).await;
        let id = CompanyId::new("2");
        let before = store.state();

        let err = store
            .decide(&id, Outcome::Approved, Some("looks good".into()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RequestError::InvalidStateTransition {
                id: id.clone(),
                from: RequestStatus::Approved,
                to: RequestStatus::Approved,
            }
        );
        let after = store.state();
        assert_eq!(after, before);
        assert_eq!(after.get(&id).unwrap().admin_notes(), None);
        assert_eq!(after.get(&id).unwrap().reviewed_at(), None);
        assert_eq!(errors(&notifications), 1);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_request_pending_and_decidable() {
        let gateway = Arc::new(DemoRequestGateway::seeded());
        let (store, notifications) = loaded_store(gateway.clone()).await;
        let id = CompanyId::new("1");

        gateway.fail_next(GatewayError::Unavailable("timeout".into()));
        let err = store.decide(&id, Outcome::Rejected, None).await.unwrap_err();

        assert!(matches!(err, RequestError::GatewayUnavailable(_)));
        let state = store.state();
        assert!(state.get(&id).unwrap().is_pending());
        assert!(state.can_decide(&id));
        assert_eq!(notifications.entries()[0].text, "Failed to reject company");
    }

    #[tokio::test]
    async fn authority_conflict_is_reported_and_cache_kept() {
        let gateway = Arc::new(DemoRequestGateway::seeded());
        let (store, _notifications) = loaded_store(gateway.clone()).await;
        let id = CompanyId::new("1");

        // Someone else decided at the authority after our load.
        gateway.set_status(&id, Outcome::Approved, None).await.unwrap();

        let err = store.decide(&id, Outcome::Rejected, None).await.unwrap_err();
        assert!(matches!(err, RequestError::Conflict(_)));
        assert!(store.state().get(&id).unwrap().is_pending());

        // A reload brings the authority's truth in.
        store.load_all().await.unwrap();
        assert_eq!(store.state().get(&id).unwrap().status(), RequestStatus::Approved);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let (store, _) = loaded_store(Arc::new(DemoRequestGateway::seeded())).await;
        let err = store
            .decide(&CompanyId::new("42"), Outcome::Approved, None)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::NotFound(CompanyId::new("42")));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_decision_trigger_is_ignored() {
        let gateway = Arc::new(DemoRequestGateway::seeded().with_latency(Duration::from_millis(500)));
        let (store, notifications) = loaded_store(gateway).await;
        let id = CompanyId::new("1");

        let (first, second) = tokio::join!(
            store.decide(&id, Outcome::Approved, None),
            store.decide(&id, Outcome::Approved, None)
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), RequestError::DecisionInProgress(id.clone()));
        assert!(store.state().in_flight.is_empty());
        // Only the success toast; the ignored click produced nothing.
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_load_is_rejected() {
        let gateway = Arc::new(DemoRequestGateway::seeded().with_latency(Duration::from_millis(800)));
        let store = RequestLifecycleStore::new(gateway, NotificationQueue::new());

        let (first, second) = tokio::join!(store.load_all(), store.load_all());
        assert_eq!(first.unwrap().len(), 3);
        assert_eq!(second.unwrap_err(), RequestError::LoadInProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_decision_is_visible_to_subscribers() {
        let gateway = Arc::new(DemoRequestGateway::seeded());
        let (store, _) = loaded_store(gateway).await;
        let changes = store.subscribe();
        let id = CompanyId::new("1");

        store.decide(&id, Outcome::Approved, None).await.unwrap();

        let seen = changes.drain();
        assert!(seen.first().unwrap().in_flight.contains(&id));
        assert!(!seen.first().unwrap().can_decide(&id));
        let last = seen.last().unwrap();
        assert!(last.in_flight.is_empty());
        assert_eq!(last.get(&id).unwrap().status(), RequestStatus::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn load_landing_after_reset_is_not_cached() {
        let gateway = Arc::new(DemoRequestGateway::seeded().with_latency(Duration::from_millis(800)));
        let store = RequestLifecycleStore::new(gateway, NotificationQueue::new());

        let (loaded, ()) = tokio::join!(store.load_all(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.reset();
        });

        assert_eq!(loaded.unwrap().len(), 3);
        let state = store.state();
        assert!(state.requests.is_empty());
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn decision_landing_after_reset_is_not_cached() {
        let gateway = Arc::new(DemoRequestGateway::seeded().with_latency(Duration::from_millis(500)));
        let (store, _) = loaded_store(gateway.clone()).await;
        let id = CompanyId::new("1");

        let (decided, ()) = tokio::join!(store.decide(&id, Outcome::Approved, None), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.reset();
        });

        assert_eq!(decided.unwrap().status(), RequestStatus::Approved);
        let state = store.state();
        assert!(state.requests.is_empty());
        assert!(state.in_flight.is_empty());
        // The next load starts from a clean cache and picks up the authority's copy.
        let reloaded = store.load_all().await.unwrap();
        assert_eq!(reloaded[0].status(), RequestStatus::Approved);
    }

    #[tokio::test]
    async fn unauthorized_gateway_surfaces_as_unauthorized() {
        let gateway = Arc::new(DemoRequestGateway::seeded().requiring_bearer());
        let store = RequestLifecycleStore::new(gateway, NotificationQueue::new());
        assert_eq!(store.load_all().await.unwrap_err(), RequestError::Unauthorized);
        assert!(store.requests().is_empty());
    }
}
