//! Startup configuration read from `PARTNERDESK_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};

use partnerdesk_notifications::DEFAULT_TTL;
use partnerdesk_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Directory holding the SQLite database.
    pub data_dir: PathBuf,
    /// Lifetime of a notification shown without an explicit ttl.
    pub toast_ttl: Duration,
    /// Simulated round-trip of the demo authority.
    pub demo_latency: Duration,
    pub log_format: LogFormat,
    /// Keep sessions and preferences in memory only.
    pub in_memory: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            toast_ttl: DEFAULT_TTL,
            demo_latency: Duration::ZERO,
            log_format: LogFormat::Pretty,
            in_memory: false,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup("PARTNERDESK_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let toast_ttl = match lookup("PARTNERDESK_TOAST_TTL_MS") {
            Some(raw) => millis("PARTNERDESK_TOAST_TTL_MS", &raw)?,
            None => defaults.toast_ttl,
        };

        let demo_latency = match lookup("PARTNERDESK_DEMO_LATENCY_MS") {
            Some(raw) => millis("PARTNERDESK_DEMO_LATENCY_MS", &raw)?,
            None => defaults.demo_latency,
        };

        let log_format = match lookup("PARTNERDESK_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| anyhow!(e))
                .context("invalid PARTNERDESK_LOG_FORMAT")?,
            None => defaults.log_format,
        };

        let in_memory = match lookup("PARTNERDESK_IN_MEMORY") {
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .with_context(|| format!("invalid PARTNERDESK_IN_MEMORY '{raw}' (expected true|false)"))?,
            None => defaults.in_memory,
        };

        Ok(Self {
            data_dir,
            toast_ttl,
            demo_latency,
            log_format,
            in_memory,
        })
    }
}

fn millis(key: &str, raw: &str) -> anyhow::Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .with_context(|| format!("invalid {key} '{raw}' (expected milliseconds)"))
}

/// `{app_data_dir}/partnerdesk`, falling back to `~/.local/share`.
fn default_data_dir() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("partnerdesk")
}
