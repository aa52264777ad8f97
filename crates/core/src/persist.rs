//! Key/value persistence seam used to survive process restarts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;

/// Byte-oriented key/value storage.
///
/// Implementations decide where bytes live (SQLite file, memory, ...).
/// Callers own the encoding and must treat whatever comes back from `get` as
/// untrusted input.
#[async_trait::async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<S> PersistentStore for Arc<S>
where
    S: PersistentStore + ?Sized,
{
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        (**self).remove(key).await
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any encoding (useful to plant corrupt data).
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl PersistentStore for InMemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let map = self.inner.read().map_err(|_| anyhow!("in-memory store poisoned"))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        let mut map = self.inner.write().map_err(|_| anyhow!("in-memory store poisoned"))?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut map = self.inner.write().map_err(|_| anyhow!("in-memory store poisoned"))?;
        map.remove(key);
        Ok(())
    }
}
