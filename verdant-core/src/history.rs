//! Local, append-only history of past identifications.
//!
//! The whole history lives as one JSON array under a single storage key. Every
//! `append` reads the full array, mutates it in memory and writes it back, so
//! the store is only suitable for small single-user datasets.
//!
//! Appends through one `HistoryStore` are serialized by an in-process lock.
//! Two stores sharing an adapter are not coordinated and can lose updates.

use chrono::{DateTime, Duration, Utc};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{HistoryEntry, HistoryEntryInput};
use crate::storage::{KeyValueStore, StorageError};

pub const DEFAULT_STORAGE_KEY: &str = "plantHistory";

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Bounds applied at append time. Eviction removes the oldest entries first;
/// the entry being appended is never evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetentionPolicy {
    pub max_entries: Option<NonZeroUsize>,
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age.is_none()
    }

    /// Trims the entries already stored so that, together with one new entry
    /// created at `now`, the history stays inside the bounds.
    fn make_room(&self, existing: &mut Vec<HistoryEntry>, now: DateTime<Utc>) -> usize {
        let before = existing.len();
        sort_newest_first(existing);
        if let Some(max_age) = self.max_age {
            let cutoff = now - max_age;
            existing.retain(|e| e.created_at >= cutoff);
        }
        if let Some(max) = self.max_entries {
            existing.truncate(max.get() - 1);
        }
        before - existing.len()
    }
}

fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    retention: RetentionPolicy,
    clock: Clock,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("key", &self.key)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            key: DEFAULT_STORAGE_KEY.to_string(),
            retention: RetentionPolicy::unbounded(),
            clock: Arc::new(Utc::now),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn read_all(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        match self.storage.get(&self.key).await? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|source| {
                tracing::error!(key = %self.key, error = %source, "History payload is corrupt");
                StorageError::Corrupt {
                    key: self.key.clone(),
                    source,
                }
            }),
        }
    }

    /// Record a new identification. The store assigns `id` and `created_at`.
    ///
    /// On failure the persisted history is left exactly as it was.
    pub async fn append(&self, input: HistoryEntryInput) -> Result<HistoryEntry, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_all().await?;
        let now = (self.clock)();

        let entry = HistoryEntry {
            id: Uuid::now_v7().to_string(),
            image_reference: input.image_reference,
            result: input.result,
            created_at: now,
        };

        if !self.retention.is_unbounded() {
            let evicted = self.retention.make_room(&mut entries, now);
            if evicted > 0 {
                tracing::info!(evicted, key = %self.key, "Evicted history entries past retention");
            }
        }
        entries.push(entry.clone());

        let payload = serde_json::to_string(&entries).map_err(StorageError::Serialize)?;
        self.storage.set(&self.key, &payload).await?;

        tracing::debug!(id = %entry.id, total = entries.len(), "History entry appended");
        Ok(entry)
    }

    /// Usable entries, newest first. Empty when nothing has been stored yet.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut entries = self.read_all().await?;
        let total = entries.len();
        entries.retain(HistoryEntry::is_usable);
        if entries.len() < total {
            tracing::debug!(
                skipped = total - entries.len(),
                "Skipping history entries without an image reference"
            );
        }
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry. Clearing an empty store succeeds.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await?;
        tracing::info!(key = %self.key, "History cleared");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
