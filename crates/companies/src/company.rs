use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partnerdesk_core::{CompanyId, DomainError, DomainResult, UserId};

/// Company profile as submitted at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub business_registration_number: String,
    pub tax_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two decisions an administrator can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    pub fn status(&self) -> RequestStatus {
        match self {
            Outcome::Approved => RequestStatus::Approved,
            Outcome::Rejected => RequestStatus::Rejected,
        }
    }

    /// Imperative verb for user-facing messages ("approve", "reject").
    pub fn verb(&self) -> &'static str {
        match self {
            Outcome::Approved => "approve",
            Outcome::Rejected => "reject",
        }
    }
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.status().as_str())
    }
}

/// An onboarding application under review.
///
/// # Invariants
/// - While `pending`, no review metadata (notes, reviewer, review time) is set.
/// - `approved` and `rejected` are terminal: no transition leaves them.
/// - Records are never deleted, only transitioned.
///
/// Fields are private so the invariants also hold for records decoded from
/// the wire (decoding goes through the same check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCompanyRequest", into = "RawCompanyRequest")]
pub struct CompanyRequest {
    company: Company,
    status: RequestStatus,
    admin_notes: Option<String>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl CompanyRequest {
    /// A freshly submitted application.
    pub fn pending(company: Company) -> Self {
        Self {
            company,
            status: RequestStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    /// A record that has already been reviewed (e.g. loaded from history).
    pub fn reviewed(
        company: Company,
        outcome: Outcome,
        admin_notes: Option<String>,
        reviewed_by: Option<UserId>,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            company,
            status: outcome.status(),
            admin_notes,
            reviewed_by,
            reviewed_at,
        }
    }

    pub fn id(&self) -> &CompanyId {
        &self.company.id
    }

    pub fn company(&self) -> &Company {
        &self.company
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn admin_notes(&self) -> Option<&str> {
        self.admin_notes.as_deref()
    }

    pub fn reviewed_by(&self) -> Option<&UserId> {
        self.reviewed_by.as_ref()
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Check that `outcome` is a legal next step.
    pub fn ensure_can_decide(&self, outcome: Outcome) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                outcome.status().as_str(),
            ));
        }
        Ok(())
    }

    /// The record after a decision. Does not mutate `self`.
    pub fn decide(
        &self,
        outcome: Outcome,
        notes: Option<String>,
        reviewed_by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> DomainResult<CompanyRequest> {
        self.ensure_can_decide(outcome)?;

        let mut company = self.company.clone();
        company.updated_at = at;

        Ok(CompanyRequest {
            company,
            status: outcome.status(),
            admin_notes: normalize_notes(notes),
            reviewed_by,
            reviewed_at: Some(at),
        })
    }
}

/// Blank notes are no notes.
pub(crate) fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Wire shape: the company profile flattened next to the review fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompanyRequest {
    #[serde(flatten)]
    company: Company,
    status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reviewed_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawCompanyRequest> for CompanyRequest {
    type Error = DomainError;

    fn try_from(raw: RawCompanyRequest) -> Result<Self, Self::Error> {
        let has_review = raw.admin_notes.is_some() || raw.reviewed_by.is_some() || raw.reviewed_at.is_some();
        if raw.status == RequestStatus::Pending && has_review {
            return Err(DomainError::validation(format!(
                "pending request {} carries review metadata",
                raw.company.id
            )));
        }
        Ok(CompanyRequest {
            company: raw.company,
            status: raw.status,
            admin_notes: raw.admin_notes,
            reviewed_by: raw.reviewed_by,
            reviewed_at: raw.reviewed_at,
        })
    }
}

impl From<CompanyRequest> for RawCompanyRequest {
    fn from(request: CompanyRequest) -> Self {
        RawCompanyRequest {
            company: request.company,
            status: request.status,
            admin_notes: request.admin_notes,
            reviewed_by: request.reviewed_by,
            reviewed_at: request.reviewed_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn company(id: &str) -> Company {
        let at = "2024-01-15T10:30:00Z".parse().unwrap();
        Company {
            id: CompanyId::new(id),
            name: format!("Company {id}"),
            email: format!("info@company{id}.test"),
            phone: "+1234567890".into(),
            address: "123 Main St".into(),
            city: "New York".into(),
            state: "NY".into(),
            zip_code: "10001".into(),
            country: "USA".into(),
            business_registration_number: "BRN123456".into(),
            tax_id: "TAX789012".into(),
            logo: None,
            website: None,
            description: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn pending_request_can_be_approved() {
        let request = CompanyRequest::pending(company("1"));
        let at = Utc::now();
        let approved = request
            .decide(Outcome::Approved, Some("looks good".into()), Some(UserId::new("9")), at)
            .unwrap();

        assert_eq!(approved.status(), RequestStatus::Approved);
        assert_eq!(approved.admin_notes(), Some("looks good"));
        assert_eq!(approved.reviewed_by(), Some(&UserId::new("9")));
        assert_eq!(approved.reviewed_at(), Some(at));
        assert_eq!(approved.company().updated_at, at);
        // Decided copies leave the source record alone.
        assert!(request.is_pending());
    }

    #[test]
    fn blank_notes_are_dropped() {
        let request = CompanyRequest::pending(company("1"));
        let rejected = request
            .decide(Outcome::Rejected, Some("   ".into()), None, Utc::now())
            .unwrap();
        assert_eq!(rejected.admin_notes(), None);
    }

    #[test]
    fn terminal_states_refuse_every_transition() {
        for first in [Outcome::Approved, Outcome::Rejected] {
            let decided = CompanyRequest::pending(company("2"))
                .decide(first, None, None, Utc::now())
                .unwrap();
            for second in [Outcome::Approved, Outcome::Rejected] {
                let err = decided.decide(second, Some("again".into()), None, Utc::now()).unwrap_err();
                assert_eq!(
                    err,
                    DomainError::invalid_transition(first.status().as_str(), second.status().as_str())
                );
            }
        }
    }

    #[test]
    fn wire_format_is_flat_camel_case() {
        let request = CompanyRequest::reviewed(
            company("3"),
            Outcome::Rejected,
            Some("Incomplete documentation provided".into()),
            None,
            None,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["adminNotes"], "Incomplete documentation provided");
        assert_eq!(json["zipCode"], "10001");
        assert!(json.get("reviewedAt").is_none());

        let back: CompanyRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn decoding_rejects_pending_with_review_metadata() {
        let mut json = serde_json::to_value(CompanyRequest::pending(company("1"))).unwrap();
        json["adminNotes"] = "sneaky".into();
        assert!(serde_json::from_value::<CompanyRequest>(json).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn outcome() -> impl Strategy<Value = Outcome> {
            prop_oneof![Just(Outcome::Approved), Just(Outcome::Rejected)]
        }

        proptest! {
            /// Property: after the first decision every further decision fails,
            /// whatever the notes.
            #[test]
            fn only_the_first_decision_sticks(
                outcomes in proptest::collection::vec(outcome(), 1..6),
                notes in proptest::option::of("[a-z ]{0,20}")
            ) {
                let mut request = CompanyRequest::pending(company("1"));
                let first = outcomes[0];
                request = request.decide(first, notes.clone(), None, Utc::now()).unwrap();

                for next in &outcomes[1..] {
                    let before = request.clone();
                    prop_assert!(request.decide(*next, notes.clone(), None, Utc::now()).is_err());
                    prop_assert_eq!(&request, &before);
                }
                prop_assert_eq!(request.status(), first.status());
            }
        }
    }
}
