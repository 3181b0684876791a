//! In-memory TTL session store
//!
//! Keys are `{sessionID}` and `{sessionID}:{source}`. Each logical
//! writer (source x session) owns its own sub-key, so writes to
//! different sub-keys never conflict; concurrent writes to the same
//! sub-key are serialized by the store lock and resolve last-write-wins.

use async_trait::async_trait;
use catalogchat_core::error::Result;
use catalogchat_core::traits::SessionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// TTL key-value store held in process memory
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it under the write lock
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired()) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<usize> {
        let prefix = format!("{session_id}:");
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key != session_id && !key.starts_with(&prefix));
        let removed = before - entries.len();
        debug!("Deleted {} cache entr(ies) for session {}", removed, session_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = InMemorySessionStore::new();
        store.set("s1:vector", json!([1, 2]), 60).await.unwrap();
        assert_eq!(store.get("s1:vector").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = InMemorySessionStore::new();
        store.set("s1:graph", json!(["old"]), 60).await.unwrap();
        store.set("s1:graph", json!(["new"]), 60).await.unwrap();
        assert_eq!(store.get("s1:graph").await.unwrap(), Some(json!(["new"])));
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = InMemorySessionStore::new();
        store.set("s1", json!(1), 0).await.unwrap();
        assert_eq!(store.get("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = InMemorySessionStore::new();
        store.set("s1", json!(1), 60).await.unwrap();
        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_session_removes_all_sub_keys() {
        let store = InMemorySessionStore::new();
        store.set("s1", json!("root"), 60).await.unwrap();
        store.set("s1:vector", json!(1), 60).await.unwrap();
        store.set("s1:graph", json!(2), 60).await.unwrap();
        store.set("s2:vector", json!(3), 60).await.unwrap();

        let removed = store.delete_session("s1").await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.get("s1:vector").await.unwrap(), None);
        // Other sessions untouched
        assert_eq!(store.get("s2:vector").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemorySessionStore::new();
        store.set("gone", json!(1), 0).await.unwrap();
        store.set("kept", json!(2), 60).await.unwrap();
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.get("kept").await.unwrap(), Some(json!(2)));
    }
}
