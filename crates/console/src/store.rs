//! SQLite-backed key/value store for sessions and preferences.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use partnerdesk_core::PersistentStore;

const DB_FILE: &str = "partnerdesk.db";

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Lazily opened SQLite database with a single `kv` table.
///
/// Nothing touches the disk until the first read or write.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    location: Location,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteStore {
    /// Store at `{data_dir}/partnerdesk.db`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(data_dir.into().join(DB_FILE)),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Private in-memory database, gone when the store is dropped.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    async fn pool(&self) -> anyhow::Result<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let options = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create data directory at {parent:?}"))?;
                }
                SqliteConnectOptions::new().filename(path).create_if_missing(true)
            }
            Location::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .context("invalid in-memory SQLite URL")?,
        };

        // One connection: an in-memory database exists per connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open SQLite store ({:?})", self.location))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY NOT NULL,
                value      BLOB NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv table")?;

        tracing::debug!(location = ?self.location, "SQLite store opened");
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait::async_trait]
impl PersistentStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .with_context(|| format!("failed to read '{key}'"))?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Vec<u8>, _>("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&pool)
        .await
        .with_context(|| format!("failed to write '{key}'"))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .with_context(|| format!("failed to remove '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_overwrite_remove() {
        let store = SqliteStore::in_memory();
        assert_eq!(store.get("auth-storage").await.unwrap(), None);

        store.set("auth-storage", b"one".to_vec()).await.unwrap();
        store.set("auth-storage", b"two".to_vec()).await.unwrap();
        assert_eq!(store.get("auth-storage").await.unwrap(), Some(b"two".to_vec()));

        store.remove("auth-storage").await.unwrap();
        store.remove("auth-storage").await.unwrap();
        assert_eq!(store.get("auth-storage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_the_database() {
        let store = SqliteStore::in_memory();
        let other = store.clone();
        store.set("theme-storage", b"{}".to_vec()).await.unwrap();
        assert_eq!(other.get("theme-storage").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("partnerdesk-store-{}", std::process::id()));
        {
            let store = SqliteStore::new(&dir);
            store.set("k", vec![1, 2, 3]).await.unwrap();
        }
        let reopened = SqliteStore::new(&dir);
        assert_eq!(reopened.get("k").await.unwrap(), Some(vec![1, 2, 3]));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
