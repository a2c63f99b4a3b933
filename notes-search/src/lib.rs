//! Notes Search - fuzzy full-text search over a notes corpus
//!
//! Weighted approximate matching over title, content, tags and notebook,
//! structural filters, a debounced query pipeline that runs on a background
//! worker (with in-process fallback), match highlighting, and a persisted
//! search history.
//!
//! [`SearchSession`] is the entry point; everything it reports is published
//! through a [`SearchState`] watch channel.

pub mod config;
pub mod corpus;
pub mod debounce;
mod execution;
pub mod filter;
pub mod highlight;
pub mod history;
pub mod index;
pub mod interface;
pub mod ranking;
mod session;
pub mod storage;
pub mod worker;

pub use config::{FieldWeights, MatchOptions, SearchConfig};
pub use highlight::{highlight_matches, highlight_matches_with};
pub use index::FuzzyIndex;
pub use interface::*;
pub use session::SearchSession;
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};
pub use worker::{ThreadWorkerSpawner, WorkerHandle, WorkerRequest, WorkerResponse, WorkerSpawner};
