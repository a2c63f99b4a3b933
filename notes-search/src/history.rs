//! Search history: bounded, deduplicated, most-recent-first.
//!
//! Loaded once at construction and written back after every mutation.
//! Storage failures are logged and never reach the caller.

use crate::config::{DEFAULT_HISTORY_KEY, DEFAULT_HISTORY_LIMIT, DEFAULT_MIN_QUERY_LEN};
use crate::storage::{KeyValueStore, StorageResult};
use std::sync::Arc;

pub struct SearchHistory {
    entries: Vec<String>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    limit: usize,
}

impl SearchHistory {
    /// Load history from `store`. Unreadable or malformed data yields an
    /// empty history.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>, limit: usize) -> Self {
        let key = key.into();
        let limit = limit.max(1);
        let entries = match Self::read(store.as_ref(), &key) {
            Ok(stored) => {
                let mut entries: Vec<String> = Vec::with_capacity(limit);
                for entry in stored {
                    let trimmed = entry.trim();
                    if trimmed.chars().count() < DEFAULT_MIN_QUERY_LEN || entries.iter().any(|e| e == trimmed) {
                        continue;
                    }
                    entries.push(trimmed.to_string());
                    if entries.len() == limit {
                        break;
                    }
                }
                entries
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "failed to load search history");
                Vec::new()
            }
        };
        Self { entries, store, key, limit }
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::load(store, DEFAULT_HISTORY_KEY, DEFAULT_HISTORY_LIMIT)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Record a query. Returns `false` when it was too short to keep.
    pub fn add(&mut self, query: &str) -> bool {
        let trimmed = query.trim();
        if trimmed.chars().count() < DEFAULT_MIN_QUERY_LEN {
            return false;
        }
        self.entries.retain(|entry| entry != trimmed);
        self.entries.insert(0, trimmed.to_string());
        self.entries.truncate(self.limit);
        self.persist();
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn read(store: &dyn KeyValueStore, key: &str) -> StorageResult<Vec<String>> {
        match store.get_item(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(Into::into)
            .and_then(|json| self.store.set_item(&self.key, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %self.key, "failed to save search history");
        }
    }
}
