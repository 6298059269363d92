//! Reversible entity-to-placeholder mapping storage.
//!
//! One mapping set exists per owner key (user + session). Placeholder ids
//! take the form `{KIND}_{n}` with `n` starting at 1 per kind per owner.
//! The same original value appearing twice yields two distinct placeholders;
//! no value-level deduplication is performed.

use crate::error::Result;
use caduceus_core::{EntityKind, OwnerKey, Timestamp};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One persisted mapping entry in snapshot form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Placeholder id, e.g. `PERSON_1`
    pub placeholder: String,
    /// Entity kind the placeholder stands for
    pub kind: EntityKind,
    /// The original value that was masked
    pub value: String,
    /// When the mapping was recorded
    pub created_at: Timestamp,
}

#[derive(Debug)]
struct MappingEntry {
    kind: EntityKind,
    value: String,
    created_at: Timestamp,
}

#[derive(Debug)]
struct MappingSet {
    entries: HashMap<String, MappingEntry>,
    counters: HashMap<EntityKind, u32>,
    last_used: Timestamp,
}

impl MappingSet {
    fn new(now: Timestamp) -> Self {
        Self {
            entries: HashMap::new(),
            counters: HashMap::new(),
            last_used: now,
        }
    }
}

/// Store of reversible entity-to-placeholder mapping sets.
///
/// Reservations for the same owner key are serialized through a per-owner
/// mutex so concurrent redactions never allocate duplicate indices; the
/// outer map lock is held only long enough to fetch or create the per-owner
/// handle, so different owners do not contend.
#[derive(Debug)]
pub struct MappingStore {
    retention: Duration,
    sets: Mutex<HashMap<OwnerKey, Arc<Mutex<MappingSet>>>>,
}

impl MappingStore {
    /// Create a store that expires idle mapping sets after `hours`.
    #[must_use]
    pub fn with_retention_hours(hours: i64) -> Self {
        Self {
            retention: Duration::hours(hours),
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next placeholder for `kind` under `owner` and record
    /// the mapping to `value`.
    ///
    /// # Errors
    /// Currently infallible; the `Result` keeps the contract open for
    /// persistent backends.
    pub async fn reserve(
        &self,
        owner: &OwnerKey,
        kind: EntityKind,
        value: impl Into<String>,
    ) -> Result<String> {
        self.reserve_at(owner, kind, value, Utc::now()).await
    }

    /// Clock-injected variant of [`reserve`](Self::reserve).
    pub async fn reserve_at(
        &self,
        owner: &OwnerKey,
        kind: EntityKind,
        value: impl Into<String>,
        now: Timestamp,
    ) -> Result<String> {
        let set = self.set_for(owner, now).await;
        let mut set = set.lock().await;

        let counter = set.counters.entry(kind).or_insert(0);
        *counter += 1;
        let placeholder = format!("{}_{}", kind.as_str(), *counter);

        set.entries.insert(
            placeholder.clone(),
            MappingEntry {
                kind,
                value: value.into(),
                created_at: now,
            },
        );
        set.last_used = now;

        tracing::debug!(owner = %owner, %placeholder, "reserved placeholder");
        Ok(placeholder)
    }

    /// Resolve a placeholder back to its original value.
    ///
    /// Returns `None` if the owner has no mapping set or the placeholder
    /// was never reserved (or has been purged). Resolution never mutates
    /// the stored mapping.
    pub async fn resolve(&self, owner: &OwnerKey, placeholder: &str) -> Option<String> {
        let handle = {
            let sets = self.sets.lock().await;
            sets.get(owner).cloned()
        };
        let set = handle?;
        let set = set.lock().await;
        set.entries.get(placeholder).map(|e| e.value.clone())
    }

    /// Drop the owner's mapping set on explicit session termination.
    ///
    /// Returns true if a set existed.
    pub async fn end_session(&self, owner: &OwnerKey) -> bool {
        let removed = self.sets.lock().await.remove(owner).is_some();
        if removed {
            tracing::info!(owner = %owner, "mapping set dropped on session end");
        }
        removed
    }

    /// Remove mapping sets idle past the retention window.
    ///
    /// Returns the number of sets removed. Safe to run concurrently with
    /// request handling; per-owner locks are taken only momentarily.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    /// Clock-injected variant of [`purge_expired`](Self::purge_expired).
    pub async fn purge_expired_at(&self, now: Timestamp) -> usize {
        let handles: Vec<(OwnerKey, Arc<Mutex<MappingSet>>)> = {
            let sets = self.sets.lock().await;
            sets.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut expired = Vec::new();
        for (owner, handle) in handles {
            let set = handle.lock().await;
            if now - set.last_used > self.retention {
                expired.push(owner);
            }
        }

        let mut sets = self.sets.lock().await;
        let mut removed = 0;
        for owner in expired {
            if sets.remove(&owner).is_some() {
                tracing::info!(owner = %owner, "purged expired mapping set");
                removed += 1;
            }
        }
        removed
    }

    /// Export the owner's mappings in persisted form, ordered by creation
    /// time then placeholder id.
    pub async fn snapshot(&self, owner: &OwnerKey) -> Vec<MappingRecord> {
        let handle = {
            let sets = self.sets.lock().await;
            sets.get(owner).cloned()
        };
        let Some(handle) = handle else {
            return Vec::new();
        };

        let set = handle.lock().await;
        let mut records: Vec<MappingRecord> = set
            .entries
            .iter()
            .map(|(placeholder, entry)| MappingRecord {
                placeholder: placeholder.clone(),
                kind: entry.kind,
                value: entry.value.clone(),
                created_at: entry.created_at,
            })
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.placeholder.cmp(&b.placeholder))
        });
        records
    }

    /// Number of live mapping sets (for maintenance reporting).
    pub async fn len(&self) -> usize {
        self.sets.lock().await.len()
    }

    /// Whether the store holds no mapping sets.
    pub async fn is_empty(&self) -> bool {
        self.sets.lock().await.is_empty()
    }

    /// Fetch or lazily create the per-owner set handle.
    async fn set_for(&self, owner: &OwnerKey, now: Timestamp) -> Arc<Mutex<MappingSet>> {
        let mut sets = self.sets.lock().await;
        sets.entry(owner.clone())
            .or_insert_with(|| Arc::new(Mutex::new(MappingSet::new(now))))
            .clone()
    }
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::with_retention_hours(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerKey {
        OwnerKey::new("alice", "s1").expect("valid owner key")
    }

    #[tokio::test]
    async fn test_reserve_numbers_monotonically_per_kind() {
        let store = MappingStore::default();
        let owner = owner();

        let p1 = store
            .reserve(&owner, EntityKind::Person, "John Smith")
            .await
            .expect("reserve");
        let p2 = store
            .reserve(&owner, EntityKind::Person, "Jane Roe")
            .await
            .expect("reserve");
        let phone = store
            .reserve(&owner, EntityKind::PhoneNumber, "555-123-4567")
            .await
            .expect("reserve");

        assert_eq!(p1, "PERSON_1");
        assert_eq!(p2, "PERSON_2");
        assert_eq!(phone, "PHONE_NUMBER_1");
    }

    #[tokio::test]
    async fn test_duplicate_values_get_distinct_placeholders() {
        let store = MappingStore::default();
        let owner = owner();

        let p1 = store
            .reserve(&owner, EntityKind::Person, "John Smith")
            .await
            .expect("reserve");
        let p2 = store
            .reserve(&owner, EntityKind::Person, "John Smith")
            .await
            .expect("reserve");

        assert_ne!(p1, p2);
        assert_eq!(
            store.resolve(&owner, &p1).await.as_deref(),
            Some("John Smith")
        );
        assert_eq!(
            store.resolve(&owner, &p2).await.as_deref(),
            Some("John Smith")
        );
    }

    #[tokio::test]
    async fn test_counters_are_scoped_per_owner() {
        let store = MappingStore::default();
        let alice = OwnerKey::new("alice", "s1").expect("valid owner key");
        let bob = OwnerKey::new("bob", "s1").expect("valid owner key");

        let a = store
            .reserve(&alice, EntityKind::Person, "A")
            .await
            .expect("reserve");
        let b = store
            .reserve(&bob, EntityKind::Person, "B")
            .await
            .expect("reserve");

        assert_eq!(a, "PERSON_1");
        assert_eq!(b, "PERSON_1");
        assert_eq!(store.resolve(&alice, "PERSON_1").await.as_deref(), Some("A"));
        assert_eq!(store.resolve(&bob, "PERSON_1").await.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_resolve_does_not_mutate() {
        let store = MappingStore::default();
        let owner = owner();

        store
            .reserve(&owner, EntityKind::Person, "John Smith")
            .await
            .expect("reserve");

        let before = store.snapshot(&owner).await;
        let _ = store.resolve(&owner, "PERSON_1").await;
        let _ = store.resolve(&owner, "PERSON_99").await;
        let after = store.snapshot(&owner).await;

        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].placeholder, after[0].placeholder);
        assert_eq!(before[0].value, after[0].value);
    }

    #[tokio::test]
    async fn test_resolve_unknown_owner_is_none() {
        let store = MappingStore::default();
        assert!(store.resolve(&owner(), "PERSON_1").await.is_none());
    }

    #[tokio::test]
    async fn test_end_session_drops_mappings() {
        let store = MappingStore::default();
        let owner = owner();

        store
            .reserve(&owner, EntityKind::Person, "John Smith")
            .await
            .expect("reserve");

        assert!(store.end_session(&owner).await);
        assert!(store.resolve(&owner, "PERSON_1").await.is_none());
        assert!(!store.end_session(&owner).await);
    }

    #[tokio::test]
    async fn test_purge_removes_only_idle_sets() {
        let store = MappingStore::with_retention_hours(24);
        let stale = OwnerKey::new("stale", "s1").expect("valid owner key");
        let fresh = OwnerKey::new("fresh", "s1").expect("valid owner key");

        let start = Utc::now();
        store
            .reserve_at(&stale, EntityKind::Person, "Old", start)
            .await
            .expect("reserve");
        store
            .reserve_at(&fresh, EntityKind::Person, "New", start + Duration::hours(20))
            .await
            .expect("reserve");

        let removed = store.purge_expired_at(start + Duration::hours(25)).await;

        assert_eq!(removed, 1);
        assert!(store.resolve(&stale, "PERSON_1").await.is_none());
        assert_eq!(
            store.resolve(&fresh, "PERSON_1").await.as_deref(),
            Some("New")
        );
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let store = MappingStore::with_retention_hours(24);
        let owner = owner();
        let start = Utc::now();

        store
            .reserve_at(&owner, EntityKind::Person, "Old", start)
            .await
            .expect("reserve");

        let later = start + Duration::hours(30);
        assert_eq!(store.purge_expired_at(later).await, 1);
        assert_eq!(store.purge_expired_at(later).await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_orders_by_creation() {
        let store = MappingStore::default();
        let owner = owner();
        let start = Utc::now();

        store
            .reserve_at(&owner, EntityKind::Person, "First", start)
            .await
            .expect("reserve");
        store
            .reserve_at(
                &owner,
                EntityKind::PhoneNumber,
                "555-123-4567",
                start + Duration::seconds(1),
            )
            .await
            .expect("reserve");

        let records = store.snapshot(&owner).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].placeholder, "PERSON_1");
        assert_eq!(records[1].placeholder, "PHONE_NUMBER_1");
    }

    #[tokio::test]
    async fn test_concurrent_reserves_allocate_unique_ids() {
        let store = Arc::new(MappingStore::default());
        let owner = owner();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store
                    .reserve(&owner, EntityKind::Person, format!("value-{i}"))
                    .await
                    .expect("reserve")
            }));
        }

        let mut placeholders = Vec::new();
        for handle in handles {
            placeholders.push(handle.await.expect("join"));
        }

        placeholders.sort();
        placeholders.dedup();
        assert_eq!(placeholders.len(), 16, "placeholders must be unique");
    }
}
