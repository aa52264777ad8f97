//! `partnerdesk-companies` - onboarding requests and their review lifecycle.
//!
//! A request moves `pending -> approved` or `pending -> rejected` and then
//! never moves again. The backend authority is the source of truth; the
//! [`RequestLifecycleStore`] is a write-after-confirm cache in front of it.

pub mod company;
pub mod demo;
pub mod gateway;
pub mod lifecycle;
pub mod registration;

pub use company::{Company, CompanyRequest, Outcome, RequestStatus};
pub use demo::{DemoRequestGateway, REGISTRATION_RECEIVED};
pub use gateway::{BearerToken, GatewayError, Receipt, RegistrationIntake, RequestGateway};
pub use lifecycle::{RequestError, RequestLifecycleStore, RequestsState};
pub use registration::{CompanyRegistration, LogoUpload, MAX_LOGO_BYTES};
