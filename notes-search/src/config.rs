//! Search configuration.
//!
//! Every field has a default so hosts only override what they care about,
//! either in code or from a JSON document.

use crate::interface::{SearchError, SearchField};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quiet period before a typed query is executed
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Queries (and history entries) shorter than this are ignored
pub const DEFAULT_MIN_QUERY_LEN: usize = 2;

/// Tolerated edit distance as a fraction of the query length
pub const DEFAULT_THRESHOLD: f64 = 0.3;

pub const DEFAULT_MIN_MATCH_CHAR_LEN: usize = 2;

pub const DEFAULT_WORKER_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_HISTORY_KEY: &str = "searchHistory";

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Relative importance of each searchable field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub content: f64,
    pub tags: f64,
    pub notebook: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 0.4,
            content: 0.3,
            tags: 0.2,
            notebook: 0.1,
        }
    }
}

impl FieldWeights {
    pub fn get(&self, field: SearchField) -> f64 {
        match field {
            SearchField::Title => self.title,
            SearchField::Content => self.content,
            SearchField::Tags => self.tags,
            SearchField::Notebook => self.notebook,
        }
    }

    /// Scale weights to sum to 1.0. Negative, non-finite or all-zero weights
    /// fall back to the defaults.
    pub fn normalized(&self) -> Self {
        let values = [self.title, self.content, self.tags, self.notebook];
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Self::default();
        }
        let total: f64 = values.iter().sum();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            title: self.title / total,
            content: self.content / total,
            tags: self.tags / total,
            notebook: self.notebook / total,
        }
    }
}

/// Fuzzy matching parameters shared by the main thread and the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// 0.0 = exact substring only, 1.0 = match anything with a qualifying run
    pub threshold: f64,
    pub min_match_char_length: usize,
    pub weights: FieldWeights,
    /// Skip the 1/sqrt(tokens) field-length norm
    pub ignore_field_norm: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_match_char_length: DEFAULT_MIN_MATCH_CHAR_LEN,
            weights: FieldWeights::default(),
            ignore_field_norm: false,
        }
    }
}

impl MatchOptions {
    pub fn normalized(&self) -> Self {
        let threshold = if self.threshold.is_finite() {
            self.threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            threshold,
            min_match_char_length: self.min_match_char_length.max(1),
            weights: self.weights.normalized(),
            ignore_field_norm: self.ignore_field_norm,
        }
    }
}

/// Top-level configuration of a [`crate::SearchSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub min_query_length: usize,
    /// Try to run matching on a background worker
    pub use_worker: bool,
    /// Degrade to in-process matching when the worker is unusable
    pub fallback_to_main_thread: bool,
    /// `None` waits forever for a worker response
    pub worker_timeout_ms: Option<u64>,
    pub history_key: String,
    pub history_limit: usize,
    pub matching: MatchOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_query_length: DEFAULT_MIN_QUERY_LEN,
            use_worker: true,
            fallback_to_main_thread: true,
            worker_timeout_ms: Some(DEFAULT_WORKER_TIMEOUT_MS),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            matching: MatchOptions::default(),
        }
    }
}

impl SearchConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Configuration that never spawns a worker
    pub fn main_thread_only() -> Self {
        Self {
            use_worker: false,
            ..Self::default()
        }
    }

    pub fn normalized(mut self) -> Self {
        self.matching = self.matching.normalized();
        self.min_query_length = self.min_query_length.max(1);
        self.history_limit = self.history_limit.max(1);
        if self.history_key.trim().is_empty() {
            self.history_key = DEFAULT_HISTORY_KEY.to_string();
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_ms.map(Duration::from_millis)
    }
}
