use std::time::Duration;

use serde::{Deserialize, Serialize};

use partnerdesk_core::NotificationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    pub id: NotificationId,
    pub text: String,
    pub severity: Severity,
    /// Zero means sticky: only an explicit dismiss removes it.
    pub ttl: Duration,
}

impl NotificationEntry {
    pub fn is_sticky(&self) -> bool {
        self.ttl.is_zero()
    }
}
