//! Execution strategy: where fuzzy matching runs.
//!
//! State machine:
//! - `Uninitialized` → `initialize()` spawns a worker when enabled and
//!   supported (`Worker`), otherwise builds an in-process index
//!   (`MainThread` after a failed spawn, `Disabled` on explicit opt-out), or
//!   gives up (`Unavailable`) when fallback is off.
//! - `Worker` → `fall_back()` on error, exit or timeout: the worker is
//!   terminated and a fresh index is built in-process.
//!
//! The strategy only decides and dispatches. Sequencing, stale-response
//! filtering and state publication belong to the session.

use crate::config::SearchConfig;
use crate::corpus::DocumentView;
use crate::index::FuzzyIndex;
use crate::interface::{FilterCriteria, SearchError};
use crate::worker::{WorkerHandle, WorkerRequest, WorkerResponse, WorkerSpawner};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

enum Backend {
    Uninitialized,
    Worker(WorkerHandle),
    MainThread(Arc<FuzzyIndex>),
    Disabled(Arc<FuzzyIndex>),
    Unavailable,
}

/// What the caller must do to complete a dispatched query
pub enum DispatchPlan {
    /// Sent to the worker; the answer arrives on its response stream
    Sent { worker_id: u64 },
    /// Match in-process against this index
    Local(Arc<FuzzyIndex>),
}

/// Outcome of `initialize`
pub struct Initialized {
    /// Response stream of a freshly spawned worker, to be pumped by the caller
    pub responses: Option<(u64, UnboundedReceiver<WorkerResponse>)>,
    /// Failure to surface to the user even though initialization went on
    pub error: Option<SearchError>,
}

pub struct ExecutionStrategy {
    backend: Backend,
    config: SearchConfig,
}

impl ExecutionStrategy {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            backend: Backend::Uninitialized,
            config,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.backend, Backend::Uninitialized)
    }

    /// `false` once search has been given up for good
    pub fn is_available(&self) -> bool {
        !matches!(self.backend, Backend::Unavailable)
    }

    pub fn is_using_worker(&self) -> bool {
        matches!(self.backend, Backend::Worker(_))
    }

    /// Id of the live worker, if any
    pub fn worker_id(&self) -> Option<u64> {
        match &self.backend {
            Backend::Worker(handle) => Some(handle.id()),
            _ => None,
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.backend {
            Backend::Uninitialized => "uninitialized",
            Backend::Worker(_) => "worker",
            Backend::MainThread(_) => "main-thread-fallback",
            Backend::Disabled(_) => "main-thread",
            Backend::Unavailable => "unavailable",
        }
    }

    /// Pick and prepare a backend for `view`. `spawner` is `None` when the
    /// environment cannot run workers at all.
    pub fn initialize(&mut self, view: &DocumentView, spawner: Option<&dyn WorkerSpawner>) -> Initialized {
        if !self.config.use_worker {
            tracing::debug!("worker disabled by configuration, searching in-process");
            self.backend = Backend::Disabled(self.build_index(view));
            return Initialized { responses: None, error: None };
        }

        let spawned = match spawner {
            Some(spawner) => spawner.spawn().and_then(|mut handle| {
                handle.send(self.initialize_request(view))?;
                let responses = handle
                    .take_responses()
                    .ok_or_else(|| SearchError::InitializationFailed { reason: "worker response stream unavailable".to_string() })?;
                Ok((handle, responses))
            }),
            None => Err(SearchError::WorkerUnsupported),
        };

        match spawned {
            Ok((handle, responses)) => {
                let id = handle.id();
                tracing::debug!(worker_id = id, documents = view.len(), "search worker started");
                self.backend = Backend::Worker(handle);
                Initialized { responses: Some((id, responses)), error: None }
            }
            Err(e) if self.config.fallback_to_main_thread => {
                tracing::warn!(error = %e, "search worker unavailable, falling back to main thread");
                self.backend = Backend::MainThread(self.build_index(view));
                Initialized { responses: None, error: Some(e) }
            }
            Err(e) => {
                tracing::error!(error = %e, "search worker unavailable and fallback disabled");
                self.backend = Backend::Unavailable;
                let surfaced = match e {
                    SearchError::WorkerUnsupported => SearchError::NotAvailable,
                    SearchError::InitializationFailed { reason } => SearchError::InitializationFailed { reason },
                    other => SearchError::InitializationFailed { reason: other.to_string() },
                };
                Initialized { responses: None, error: Some(surfaced) }
            }
        }
    }

    /// Corpus changed: regenerate the index wherever it lives.
    pub fn rebuild(&mut self, view: &DocumentView) -> Result<(), SearchError> {
        if let Backend::Worker(handle) = &self.backend {
            return handle.send(self.initialize_request(view));
        }
        match self.backend {
            Backend::MainThread(_) => self.backend = Backend::MainThread(self.build_index(view)),
            Backend::Disabled(_) => self.backend = Backend::Disabled(self.build_index(view)),
            Backend::Uninitialized => return Err(SearchError::NotInitialized),
            Backend::Worker(_) | Backend::Unavailable => return Err(SearchError::NotAvailable),
        }
        Ok(())
    }

    /// Hand one query to the active backend.
    ///
    /// In-process backends return a shared handle to the index so the caller
    /// can match without holding its locks.
    pub fn dispatch(&self, seq: u64, query: &str, criteria: &FilterCriteria) -> Result<DispatchPlan, SearchError> {
        match &self.backend {
            Backend::Worker(handle) => {
                handle.send(WorkerRequest::Search {
                    seq,
                    query: query.to_string(),
                    criteria: criteria.clone(),
                })?;
                Ok(DispatchPlan::Sent { worker_id: handle.id() })
            }
            Backend::MainThread(index) | Backend::Disabled(index) => Ok(DispatchPlan::Local(Arc::clone(index))),
            Backend::Uninitialized => Err(SearchError::NotInitialized),
            Backend::Unavailable => Err(SearchError::NotAvailable),
        }
    }

    /// The worker failed. Returns `true` when matching moved in-process.
    /// With fallback disabled a dead worker leaves search unavailable, while a
    /// live one keeps serving.
    pub fn fall_back(&mut self, view: &DocumentView, worker_alive: bool) -> bool {
        if !matches!(self.backend, Backend::Worker(_)) {
            return false;
        }
        if self.config.fallback_to_main_thread {
            tracing::warn!("search worker failed, falling back to main thread");
            self.terminate();
            self.backend = Backend::MainThread(self.build_index(view));
            true
        } else {
            if !worker_alive {
                tracing::error!("search worker exited and fallback is disabled");
                self.terminate();
                self.backend = Backend::Unavailable;
            }
            false
        }
    }

    /// Stop the worker, if any. In-process indexes are kept.
    pub fn terminate(&mut self) {
        if !matches!(self.backend, Backend::Worker(_)) {
            return;
        }
        if let Backend::Worker(handle) = std::mem::replace(&mut self.backend, Backend::Unavailable) {
            handle.terminate();
            tracing::debug!(worker_id = handle.id(), "search worker terminated");
        }
    }

    fn initialize_request(&self, view: &DocumentView) -> WorkerRequest {
        WorkerRequest::Initialize {
            documents: view.documents().to_vec(),
            options: self.config.matching.clone(),
        }
    }

    fn build_index(&self, view: &DocumentView) -> Arc<FuzzyIndex> {
        Arc::new(FuzzyIndex::build(view.documents(), &self.config.matching))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::Document;
    use crate::worker::ThreadWorkerSpawner;
    use chrono::Utc;

    struct FailingSpawner;

    impl WorkerSpawner for FailingSpawner {
        fn spawn(&self) -> Result<WorkerHandle, SearchError> {
            Err(SearchError::InitializationFailed { reason: "no threads left".to_string() })
        }
    }

    fn view() -> DocumentView {
        DocumentView::new(&[
            Document::new("1", "Rust ownership", "borrowing", Utc::now()),
            Document::new("2", "Tokio runtime", "async tasks", Utc::now()),
        ])
    }

    fn no_fallback() -> SearchConfig {
        SearchConfig { fallback_to_main_thread: false, ..SearchConfig::default() }
    }

    #[test]
    fn test_disabled_worker_searches_in_process() {
        let mut strategy = ExecutionStrategy::new(SearchConfig::main_thread_only());
        let init = strategy.initialize(&view(), Some(&ThreadWorkerSpawner::default()));
        assert!(init.responses.is_none());
        assert!(init.error.is_none());
        assert_eq!(strategy.mode_name(), "main-thread");

        match strategy.dispatch(1, "tokio", &FilterCriteria::default()) {
            Ok(DispatchPlan::Local(index)) => assert_eq!(index.len(), 2),
            _ => panic!("expected in-process dispatch"),
        }
    }

    #[test]
    fn test_unsupported_environment_falls_back() {
        let mut strategy = ExecutionStrategy::new(SearchConfig::default());
        let init = strategy.initialize(&view(), None);
        assert_eq!(init.error, Some(SearchError::WorkerUnsupported));
        assert!(!strategy.is_using_worker());
        assert_eq!(strategy.mode_name(), "main-thread-fallback");
        assert!(matches!(strategy.dispatch(1, "rust", &FilterCriteria::default()), Ok(DispatchPlan::Local(_))));
    }

    #[test]
    fn test_unsupported_environment_without_fallback_is_unavailable() {
        let mut strategy = ExecutionStrategy::new(no_fallback());
        let init = strategy.initialize(&view(), None);
        assert_eq!(init.error, Some(SearchError::NotAvailable));
        assert!(!strategy.is_available());
        assert_eq!(strategy.dispatch(1, "rust", &FilterCriteria::default()).err(), Some(SearchError::NotAvailable));
        assert_eq!(strategy.rebuild(&view()).err(), Some(SearchError::NotAvailable));
    }

    #[test]
    fn test_spawn_failure_without_fallback_reports_initialization_failure() {
        let mut strategy = ExecutionStrategy::new(no_fallback());
        let init = strategy.initialize(&view(), Some(&FailingSpawner));
        let error = init.error.expect("error surfaced");
        assert_eq!(error.to_string(), "Failed to initialize search");
        assert!(!strategy.is_available());
    }

    #[test]
    fn test_worker_dispatch_and_fall_back() {
        let mut strategy = ExecutionStrategy::new(SearchConfig::default());
        let init = strategy.initialize(&view(), Some(&ThreadWorkerSpawner::default()));
        let (worker_id, _responses) = init.responses.expect("worker response stream");
        assert!(strategy.is_using_worker());
        assert_eq!(strategy.worker_id(), Some(worker_id));

        match strategy.dispatch(1, "rust", &FilterCriteria::default()) {
            Ok(DispatchPlan::Sent { worker_id: sent_to }) => assert_eq!(sent_to, worker_id),
            _ => panic!("expected worker dispatch"),
        }

        assert!(strategy.fall_back(&view(), true));
        assert!(!strategy.is_using_worker());
        assert_eq!(strategy.worker_id(), None);
        assert!(matches!(strategy.dispatch(2, "rust", &FilterCriteria::default()), Ok(DispatchPlan::Local(_))));

        // Already in-process
        assert!(!strategy.fall_back(&view(), false));
    }

    #[test]
    fn test_fall_back_disabled_keeps_live_worker_and_drops_dead_one() {
        let mut strategy = ExecutionStrategy::new(no_fallback());
        strategy.initialize(&view(), Some(&ThreadWorkerSpawner::default()));

        assert!(!strategy.fall_back(&view(), true));
        assert!(strategy.is_using_worker());

        assert!(!strategy.fall_back(&view(), false));
        assert!(!strategy.is_available());
    }

    #[test]
    fn test_rebuild_before_initialize() {
        let mut strategy = ExecutionStrategy::new(SearchConfig::default());
        assert_eq!(strategy.rebuild(&view()).err(), Some(SearchError::NotInitialized));
        assert_eq!(strategy.dispatch(1, "rust", &FilterCriteria::default()).err(), Some(SearchError::NotInitialized));
    }

    #[test]
    fn test_rebuild_in_process_replaces_index() {
        let mut strategy = ExecutionStrategy::new(SearchConfig::main_thread_only());
        strategy.initialize(&view(), None);
        strategy.rebuild(&DocumentView::new(&[Document::new("3", "Only note", "", Utc::now())])).unwrap();
        match strategy.dispatch(1, "note", &FilterCriteria::default()) {
            Ok(DispatchPlan::Local(index)) => assert_eq!(index.len(), 1),
            _ => panic!("expected in-process dispatch"),
        }

        // terminate leaves in-process backends alone
        strategy.terminate();
        assert_eq!(strategy.mode_name(), "main-thread");
    }
}
