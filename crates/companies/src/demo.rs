//! In-process authority for local runs and tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use partnerdesk_core::{CompanyId, UserId};

use crate::{
    BearerToken, Company, CompanyRegistration, CompanyRequest, GatewayError, Outcome, Receipt, RegistrationIntake,
    RequestGateway,
};

pub const REGISTRATION_RECEIVED: &str = "Registration successful. Your application is under review.";

/// Keeps company requests in memory and behaves like the real authority:
/// terminal records refuse further transitions, reviews are stamped with the
/// caller's bearer, and failures can be scripted.
#[derive(Debug, Default)]
pub struct DemoRequestGateway {
    records: Mutex<Vec<CompanyRequest>>,
    bearer: Mutex<Option<String>>,
    failures: Mutex<VecDeque<GatewayError>>,
    latency: Duration,
    require_bearer: bool,
}

impl DemoRequestGateway {
    /// An authority with no requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// The three sample garages: one pending, one approved, one rejected.
    pub fn seeded() -> Self {
        Self::with_records(sample_requests())
    }

    pub fn with_records(records: Vec<CompanyRequest>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Refuse every call made without a bearer token.
    pub fn requiring_bearer(mut self) -> Self {
        self.require_bearer = true;
        self
    }

    /// Make the next call fail with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, err: GatewayError) {
        lock(&self.failures).push_back(err);
    }

    /// The authority's current copy.
    pub fn records(&self) -> Vec<CompanyRequest> {
        lock(&self.records).clone()
    }

    async fn admit(&self) -> Result<Option<String>, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        let bearer = lock(&self.bearer).clone();
        if self.require_bearer && bearer.is_none() {
            return Err(GatewayError::Unauthorized);
        }
        Ok(bearer)
    }
}

impl BearerToken for DemoRequestGateway {
    fn set_bearer(&self, token: Option<String>) {
        *lock(&self.bearer) = token;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl RequestGateway for DemoRequestGateway {
    async fn list(&self) -> Result<Vec<CompanyRequest>, GatewayError> {
        self.admit().await?;
        Ok(self.records())
    }

    async fn set_status(
        &self,
        id: &CompanyId,
        outcome: Outcome,
        notes: Option<String>,
    ) -> Result<CompanyRequest, GatewayError> {
        let bearer = self.admit().await?;

        let mut records = lock(&self.records);
        let slot = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;

        let decided = slot
            .decide(outcome, notes, bearer.map(UserId::new), Utc::now())
            .map_err(|_| GatewayError::Conflict(format!("request {id} is already {}", slot.status())))?;
        *slot = decided.clone();

        tracing::debug!(id = %id, %outcome, "demo authority recorded decision");
        Ok(decided)
    }
}

#[async_trait::async_trait]
impl RegistrationIntake for DemoRequestGateway {
    async fn register(&self, registration: CompanyRegistration) -> Result<Receipt, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }

        let mut records = lock(&self.records);
        if records
            .iter()
            .any(|r| r.company().email.eq_ignore_ascii_case(&registration.email))
        {
            return Err(GatewayError::Conflict(format!(
                "a company is already registered with {}",
                registration.email
            )));
        }

        let next = records
            .iter()
            .filter_map(|r| r.id().as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = CompanyId::new(next.to_string());
        let now = Utc::now();

        let description = Some(registration.description.trim().to_string()).filter(|d| !d.is_empty());
        records.push(CompanyRequest::pending(Company {
            id: id.clone(),
            name: registration.name,
            email: registration.email,
            phone: registration.phone,
            address: registration.address,
            city: registration.city,
            state: registration.state,
            zip_code: registration.zip_code,
            country: registration.country,
            business_registration_number: registration.business_registration_number,
            tax_id: registration.tax_id,
            logo: Some(registration.logo.file_name),
            website: registration.website,
            description,
            created_at: now,
            updated_at: now,
        }));
        tracing::info!(company_id = %id, "registration received");

        Ok(Receipt {
            company_id: id,
            message: REGISTRATION_RECEIVED.to_string(),
        })
    }
}

fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
    street: (&str, &str, &str, &str),
    registration: (&str, &str),
    website: Option<&str>,
    description: Option<&str>,
    created_at: &str,
    updated_at: &str,
) -> Company {
    let (address, city, state, zip_code) = street;
    let (business_registration_number, tax_id) = registration;
    Company {
        id: CompanyId::new(id),
        name: name.into(),
        email: email.into(),
        phone: phone.into(),
        address: address.into(),
        city: city.into(),
        state: state.into(),
        zip_code: zip_code.into(),
        country: "USA".into(),
        business_registration_number: business_registration_number.into(),
        tax_id: tax_id.into(),
        logo: None,
        website: website.map(Into::into),
        description: description.map(Into::into),
        created_at: at(created_at),
        updated_at: at(updated_at),
    }
}

fn sample_requests() -> Vec<CompanyRequest> {
    vec![
        CompanyRequest::pending(sample(
            "1",
            "AutoFix Garage",
            "info@autofix.com",
            "+1234567890",
            ("123 Main St", "New York", "NY", "10001"),
            ("BRN123456", "TAX789012"),
            Some("https://autofix.com"),
            Some("Full-service auto repair shop"),
            "2024-01-15T10:30:00Z",
            "2024-01-15T10:30:00Z",
        )),
        CompanyRequest::reviewed(
            sample(
                "2",
                "QuickLube Express",
                "contact@quicklube.com",
                "+1987654321",
                ("456 Oak Ave", "Los Angeles", "CA", "90210"),
                ("BRN654321", "TAX210987"),
                Some("https://quicklube.com"),
                Some("Fast oil change and basic maintenance"),
                "2024-01-10T14:20:00Z",
                "2024-01-12T09:15:00Z",
            ),
            Outcome::Approved,
            None,
            None,
            None,
        ),
        CompanyRequest::reviewed(
            sample(
                "3",
                "Premium Motors",
                "admin@premiummotors.com",
                "+1555123456",
                ("789 Elite Blvd", "Miami", "FL", "33101"),
                ("BRN987654", "TAX456789"),
                None,
                None,
                "2024-01-08T11:45:00Z",
                "2024-01-09T16:30:00Z",
            ),
            Outcome::Rejected,
            Some("Incomplete documentation provided".into()),
            None,
            None,
        ),
    ]
}
