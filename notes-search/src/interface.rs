//! Notes Search Interface Definition
//!
//! This file defines the public types shared between the search session,
//! the worker protocol and the host application. It acts as the source of
//! truth for everything that crosses the subsystem boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A note as supplied by the owning document store. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Display order is preserved; matching ignores it
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notebook: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_trashed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            notebook: String::new(),
            is_pinned: false,
            is_trashed: false,
            created_at,
            updated_at: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_notebook(mut self, notebook: impl Into<String>) -> Self {
        self.notebook = notebook.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn pinned(mut self, is_pinned: bool) -> Self {
        self.is_pinned = is_pinned;
        self
    }

    pub fn trashed(mut self, is_trashed: bool) -> Self {
        self.is_trashed = is_trashed;
        self
    }

    /// Timestamp used by date-range filtering: last update, else creation
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEARCH RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Searchable fields of a document, in descending default importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchField {
    Title,
    Content,
    Tags,
    Notebook,
}

/// A matched character range. Both ends are inclusive character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRange {
    pub start: usize,
    pub end: usize,
}

impl MatchRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// Which substrings of one field value matched the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatch {
    pub key: SearchField,
    /// The exact field text the ranges index into
    pub field_value: String,
    pub ranges: Vec<MatchRange>,
}

/// One ranked hit. `score` is in `[0, 1]`; 0 is a perfect match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f64,
    pub matches: Vec<FieldMatch>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Inclusive date range; a missing bound is unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Structural filters. Empty lists and `None` mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub notebooks: Vec<String>,
    pub tags: Vec<String>,
    pub is_pinned: Option<bool>,
    pub date_range: Option<DateRange>,
}

impl FilterCriteria {
    /// Whether any dimension constrains the result set
    pub fn is_active(&self) -> bool {
        !self.notebooks.is_empty()
            || !self.tags.is_empty()
            || self.is_pinned.is_some()
            || self.date_range.is_some_and(|r| r.start.is_some() || r.end.is_some())
    }
}

/// Values a UI can offer as filter choices, derived from the live corpus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub notebooks: Vec<String>,
    pub tags: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REACTIVE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of everything a UI layer renders from the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    /// The trimmed query the results belong to (empty when idle)
    pub query: String,
    pub results: Vec<SearchResult>,
    pub is_searching: bool,
    pub search_error: Option<String>,
    pub search_history: Vec<String>,
    pub filter_options: FilterOptions,
    pub is_using_worker: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for search operations.
///
/// None of these escape the session: they surface as `SearchState::search_error`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    #[error("Search not available")]
    NotAvailable,
    #[error("Failed to initialize search")]
    InitializationFailed { reason: String },
    #[error("Background workers are not supported in this environment")]
    WorkerUnsupported,
    #[error("Search worker failed: {0}")]
    Worker(String),
    #[error("Search worker did not respond within {0:?}")]
    WorkerTimeout(Duration),
    #[error("Search failed: {0}")]
    Match(String),
    #[error("Search not initialized")]
    NotInitialized,
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Config(e.to_string())
    }
}
