//! Display preferences persisted across restarts.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use partnerdesk_core::{DomainError, DomainResult, PersistentStore};
use partnerdesk_events::{ChangeFeed, Subscription};

pub const THEME_STORAGE_KEY: &str = "theme-storage";
pub const DEFAULT_PRIMARY_COLOR: &str = "#1976d2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePreferences {
    pub dark_mode: bool,
    pub primary_color: String,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTheme {
    state: ThemePreferences,
    #[serde(default)]
    version: u32,
}

/// `#rgb` or `#rrggbb`.
fn validate_color(color: &str) -> DomainResult<String> {
    let color = color.trim();
    let hex = color
        .strip_prefix('#')
        .ok_or_else(|| DomainError::validation(format!("color '{color}' must start with '#'")))?;
    if !matches!(hex.len(), 3 | 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DomainError::validation(format!("'{color}' is not a hex color")));
    }
    Ok(color.to_ascii_lowercase())
}

pub struct ThemeStore {
    prefs: Mutex<ThemePreferences>,
    storage: Arc<dyn PersistentStore>,
    changes: ChangeFeed<ThemePreferences>,
}

impl ThemeStore {
    pub fn new(storage: Arc<dyn PersistentStore>) -> Self {
        Self {
            prefs: Mutex::new(ThemePreferences::default()),
            storage,
            changes: ChangeFeed::new(),
        }
    }

    pub fn current(&self) -> ThemePreferences {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> Subscription<ThemePreferences> {
        self.changes.subscribe()
    }

    /// Load saved preferences; anything unreadable yields the defaults.
    pub async fn restore(&self) -> ThemePreferences {
        let prefs = match self.storage.get(THEME_STORAGE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<PersistedTheme>(&bytes) {
                Ok(record) => match validate_color(&record.state.primary_color) {
                    Ok(primary_color) => ThemePreferences {
                        primary_color,
                        ..record.state
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "stored theme has an invalid color; using defaults");
                        ThemePreferences::default()
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "stored theme is corrupt; using defaults");
                    ThemePreferences::default()
                }
            },
            Ok(None) => ThemePreferences::default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stored theme; using defaults");
                ThemePreferences::default()
            }
        };
        self.replace(prefs.clone());
        prefs
    }

    pub async fn toggle_dark_mode(&self) -> ThemePreferences {
        let prefs = {
            let mut prefs = self.lock();
            prefs.dark_mode = !prefs.dark_mode;
            prefs.clone()
        };
        self.changes.publish(prefs.clone());
        self.save(&prefs).await;
        prefs
    }

    pub async fn set_primary_color(&self, color: &str) -> DomainResult<ThemePreferences> {
        let color = validate_color(color)?;
        let prefs = {
            let mut prefs = self.lock();
            prefs.primary_color = color;
            prefs.clone()
        };
        self.changes.publish(prefs.clone());
        self.save(&prefs).await;
        Ok(prefs)
    }

    fn replace(&self, prefs: ThemePreferences) {
        *self.lock() = prefs.clone();
        self.changes.publish(prefs);
    }

    // A failed write only costs persistence; the in-memory value stands.
    async fn save(&self, prefs: &ThemePreferences) {
        let record = PersistedTheme {
            state: prefs.clone(),
            version: 0,
        };
        let result = match serde_json::to_vec(&record) {
            Ok(bytes) => self.storage.set(THEME_STORAGE_KEY, bytes).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to persist theme preferences");
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThemePreferences> {
        self.prefs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
