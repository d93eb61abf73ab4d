//! Hash-versioned local caches.
//!
//! Both caches follow the same pattern: a cheap "hash" RPC tells us whether
//! our cached list is still current; only on a mismatch do we pay for the
//! expensive full refetch. Safe under many concurrent readers; a stale read
//! within one hash-interval is an accepted tradeoff (§4.7).

use crate::error::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Upstream conversation-service contract this cache depends on.
#[async_trait]
pub trait ConversationIdsSource: Send + Sync {
    async fn get_hash(&self, user_id: &str) -> Result<String, CacheError>;
    async fn get_conversation_ids(&self, user_id: &str) -> Result<Vec<String>, CacheError>;
}

/// Upstream group-service contract this cache depends on.
#[async_trait]
pub trait GroupMembersSource: Send + Sync {
    async fn get_hash(&self, group_id: &str) -> Result<String, CacheError>;
    async fn get_member_ids(&self, group_id: &str) -> Result<Vec<String>, CacheError>;
}

struct CacheEntry<T> {
    hash: String,
    value: T,
}

/// `userID -> list<ConversationID>`, refreshed on hash mismatch.
pub struct ConversationIdCache {
    source: Arc<dyn ConversationIdsSource>,
    entries: DashMap<String, CacheEntry<Vec<String>>>,
}

impl ConversationIdCache {
    pub fn new(source: Arc<dyn ConversationIdsSource>) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<Vec<String>, CacheError> {
        let fresh_hash = self.source.get_hash(user_id).await?;

        if let Some(entry) = self.entries.get(user_id) {
            if entry.hash == fresh_hash {
                return Ok(entry.value.clone());
            }
        }

        let ids = self.source.get_conversation_ids(user_id).await?;
        self.entries.insert(
            user_id.to_string(),
            CacheEntry {
                hash: fresh_hash,
                value: ids.clone(),
            },
        );
        Ok(ids)
    }
}

/// `groupID -> list<UserID>`, same hash-versioned pattern.
pub struct GroupMemberIdCache {
    source: Arc<dyn GroupMembersSource>,
    entries: DashMap<String, CacheEntry<Vec<String>>>,
}

impl GroupMemberIdCache {
    pub fn new(source: Arc<dyn GroupMembersSource>) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    pub async fn get(&self, group_id: &str) -> Result<Vec<String>, CacheError> {
        let fresh_hash = self.source.get_hash(group_id).await?;

        if let Some(entry) = self.entries.get(group_id) {
            if entry.hash == fresh_hash {
                return Ok(entry.value.clone());
            }
        }

        let ids = self.source.get_member_ids(group_id).await?;
        self.entries.insert(
            group_id.to_string(),
            CacheEntry {
                hash: fresh_hash,
                value: ids.clone(),
            },
        );
        Ok(ids)
    }
}

/// Fixed-membership stand-in used when no real group service is wired up
/// (local/dev bootstrapping). The hash is constant, so callers past the
/// first lookup never pay for a refetch.
#[derive(Default)]
pub struct StubGroupMembersSource {
    pub members: HashMap<String, Vec<String>>,
}

impl StubGroupMembersSource {
    pub fn set_members(&mut self, group_id: &str, user_ids: Vec<String>) {
        self.members.insert(group_id.to_string(), user_ids);
    }
}

#[async_trait]
impl GroupMembersSource for StubGroupMembersSource {
    async fn get_hash(&self, group_id: &str) -> Result<String, CacheError> {
        Ok(format!("stub:{}", self.members.get(group_id).map_or(0, Vec::len)))
    }

    async fn get_member_ids(&self, group_id: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.members.get(group_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingSource {
        hash: Mutex<String>,
        ids: Mutex<Vec<String>>,
        refetches: AtomicUsize,
    }

    #[async_trait]
    impl ConversationIdsSource for CountingSource {
        async fn get_hash(&self, _user_id: &str) -> Result<String, CacheError> {
            Ok(self.hash.lock().unwrap().clone())
        }

        async fn get_conversation_ids(&self, _user_id: &str) -> Result<Vec<String>, CacheError> {
            self.refetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.ids.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn unchanged_hash_skips_refetch() {
        let source = Arc::new(CountingSource {
            hash: Mutex::new("h1".into()),
            ids: Mutex::new(vec!["c1".into()]),
            refetches: AtomicUsize::new(0),
        });
        let cache = ConversationIdCache::new(source.clone());

        cache.get("u1").await.unwrap();
        cache.get("u1").await.unwrap();

        assert_eq!(source.refetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_hash_triggers_refetch_with_new_value() {
        let source = Arc::new(CountingSource {
            hash: Mutex::new("h1".into()),
            ids: Mutex::new(vec!["c1".into()]),
            refetches: AtomicUsize::new(0),
        });
        let cache = ConversationIdCache::new(source.clone());

        let first = cache.get("u1").await.unwrap();
        assert_eq!(first, vec!["c1".to_string()]);

        *source.hash.lock().unwrap() = "h2".into();
        *source.ids.lock().unwrap() = vec!["c1".into(), "c2".into()];

        let second = cache.get("u1").await.unwrap();
        assert_eq!(second, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(source.refetches.load(Ordering::SeqCst), 2);
    }
}
