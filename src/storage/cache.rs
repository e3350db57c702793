//! Persisted index cache.
//!
//! The whole index is written as one JSON blob into a key-value slot keyed by
//! the payload schema version. Loading is best-effort: anything unreadable or
//! from another version yields an empty map and the index is rebuilt from
//! disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::kv::KeyValueStore;
use super::models::FileEntry;
use super::store::IndexSnapshot;
use crate::error::StorageError;
use crate::metrics::{CACHE_SAVES, CACHE_SAVE_FAILURES};
use crate::Result;

/// Version of the persisted payload shape.
///
/// Bump whenever `Occurrence` or `FileEntry` serialization changes. Old
/// payloads are discarded, never migrated.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CachePayload {
    version: u32,
    files: Vec<FileEntry>,
}

/// Loads and saves the index through a key-value slot.
#[derive(Clone)]
pub struct IndexCache {
    store: Arc<dyn KeyValueStore>,
    version: u32,
}

impl IndexCache {
    /// Create a cache at the current schema version.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_version(store, CACHE_SCHEMA_VERSION)
    }

    /// Create a cache pinned to a specific schema version.
    #[must_use]
    pub fn with_version(store: Arc<dyn KeyValueStore>, version: u32) -> Self {
        Self { store, version }
    }

    /// Slot key for this cache's schema version.
    #[must_use]
    pub fn key(&self) -> String {
        format!("tag-index.v{}", self.version)
    }

    /// Load the persisted index.
    ///
    /// Never fails: missing, corrupt, or version-mismatched data yields an
    /// empty map.
    #[must_use]
    pub fn load_blocking(&self) -> HashMap<PathBuf, FileEntry> {
        let key = self.key();
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %key, "No persisted index");
                return HashMap::new();
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read persisted index");
                return HashMap::new();
            }
        };

        let payload: CachePayload = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding corrupt persisted index");
                return HashMap::new();
            }
        };

        if payload.version != self.version {
            tracing::info!(
                found = payload.version,
                expected = self.version,
                "Discarding persisted index from another schema version"
            );
            return HashMap::new();
        }

        let entries: HashMap<PathBuf, FileEntry> = payload
            .files
            .into_iter()
            .filter(|e| !e.occurrences.is_empty())
            .map(|e| (e.path.clone(), e))
            .collect();

        tracing::info!(files = entries.len(), "Loaded persisted index");
        entries
    }

    /// Persist `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend write fails.
    pub fn save_blocking(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let payload = CachePayload {
            version: self.version,
            files: snapshot.to_entries(),
        };
        let raw = serde_json::to_string(&payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.store.set(&self.key(), &raw)?;
        tracing::debug!(files = payload.files.len(), bytes = raw.len(), "Saved index");
        Ok(())
    }

    /// Load on the blocking pool.
    pub async fn load(&self) -> HashMap<PathBuf, FileEntry> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.load_blocking())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Cache load task failed");
                HashMap::new()
            })
    }

    /// Save on the blocking pool. Failures are logged and reported as `false`.
    pub async fn save(&self, snapshot: &IndexSnapshot) -> bool {
        let cache = self.clone();
        let snapshot = snapshot.clone();
        let result = tokio::task::spawn_blocking(move || cache.save_blocking(&snapshot))
            .await
            .map_err(|e| crate::Error::internal(format!("cache save task failed: {e}")))
            .and_then(|r| r);

        match result {
            Ok(()) => {
                CACHE_SAVES.inc();
                true
            }
            Err(e) => {
                CACHE_SAVE_FAILURES.inc();
                tracing::warn!(error = %e, "Failed to persist index, keeping in-memory state");
                false
            }
        }
    }
}

impl std::fmt::Debug for IndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCache")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
