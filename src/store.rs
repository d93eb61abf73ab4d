//! Shared-resource store contract.
//!
//! Per the concurrency model, the shared store (Redis-like) is the only
//! cross-process mutable state the core touches directly: brush-limit
//! counters, the sensitive-word list, and vendor token caches all live here.
//! Production deployments back this with an actual Redis; the in-memory
//! implementation below is what tests and local wiring use.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Errors from the shared store. Transport-agnostic: a Redis-backed
/// implementation maps its client errors onto this single variant.
#[derive(Debug, thiserror::Error)]
#[error("shared store error: {0}")]
pub struct StoreError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal Redis-like contract the pipeline depends on: string get/set with
/// TTL, atomic increment, list push/read, and TTL inspection.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;
    /// Remaining TTL in seconds; `0` or negative means "no TTL / expired".
    async fn ttl_secs(&self, key: &str) -> StoreResult<i64>;
    /// Atomic increment-and-return-new-value, creating the key at 0 if absent.
    async fn incr(&self, key: &str) -> StoreResult<i64>;
    async fn del(&self, key: &str) -> StoreResult<()>;
    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// In-memory `SharedStore` backed by `DashMap`. Single-process only; used by
/// tests and by the dummy/local wiring path in `main.rs`.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    lists: DashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ttl_secs(&self, key: &str) -> StoreResult<i64> {
        match self.entries.get(key) {
            Some(entry) if entry.is_live() => match entry.expires_at {
                Some(at) => Ok(at.saturating_duration_since(Instant::now()).as_secs() as i64),
                None => Ok(-1),
            },
            _ => Ok(0),
        }
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: None,
            });
        if !entry.is_live() {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let next: i64 = entry.value.parse().unwrap_or(0) + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }
}

impl MemoryStore {
    /// Test/inspection helper: read back everything pushed to a list key.
    #[cfg(test)]
    pub fn list_snapshot(&self, key: &str) -> Vec<String> {
        self.lists.get(key).map(|l| l.clone()).unwrap_or_default()
    }
}
