//! Registration payload and the one upload check the console owns.
//!
//! Field-level form validation belongs to the form layer; only the logo's
//! size and type are enforced here, once, before anything is submitted.

use serde::{Deserialize, Serialize};

use partnerdesk_core::{DomainError, DomainResult};

/// Largest accepted logo, in bytes (5 MiB).
pub const MAX_LOGO_BYTES: usize = 5 * 1024 * 1024;

/// An uploaded image, treated as an opaque blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LogoUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.bytes.len() > MAX_LOGO_BYTES {
            return Err(DomainError::validation("Logo file size must be less than 5MB"));
        }
        if !self.content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(DomainError::validation("Please upload an image file"));
        }
        Ok(())
    }
}

impl core::fmt::Debug for LogoUpload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogoUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything a company submits to apply for onboarding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRegistration {
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
    pub website: Option<String>,
    pub description: String,
    pub logo: LogoUpload,
    pub password: String,
}

impl CompanyRegistration {
    /// Checks owned by the console before submission.
    pub fn validate(&self) -> DomainResult<()> {
        self.logo.validate()
    }
}

impl core::fmt::Debug for CompanyRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompanyRegistration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("logo", &self.logo)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}
