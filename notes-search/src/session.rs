//! SearchSession - the search subsystem instance handed to a UI layer.
//!
//! Concurrency Model:
//! - Session state lives behind a `parking_lot::Mutex`; it is never held
//!   across an await and is always taken before the state channel's lock.
//! - Every issued query gets a monotonically increasing sequence number.
//!   Debounced jobs, worker responses and timeouts all re-check it, so only
//!   the most recently issued query can ever publish results.
//! - Background tasks (debounce timers, the worker response pump, timeouts)
//!   hold `Weak` references and the session's shutdown token, so `dispose()`
//!   (or dropping the session) stops all of them.
//! - Uses the ambient tokio runtime when there is one, otherwise the global
//!   FALLBACK_RUNTIME.

use crate::config::SearchConfig;
use crate::corpus::DocumentView;
use crate::debounce::Debouncer;
use crate::execution::{DispatchPlan, ExecutionStrategy};
use crate::filter::apply_filters;
use crate::history::SearchHistory;
use crate::interface::{Document, FilterCriteria, SearchError, SearchResult, SearchState};
use crate::storage::KeyValueStore;
use crate::worker::{run_guarded, ThreadWorkerSpawner, WorkerResponse, WorkerSpawner};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Global fallback Tokio runtime for sessions created outside any runtime context.
/// Shared across all sessions and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("notes-search-runtime")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Score given to filter-only results, which were never matched against a query
const UNRANKED_SCORE: f64 = 1.0;

struct Core {
    view: DocumentView,
    strategy: ExecutionStrategy,
    criteria: FilterCriteria,
    /// Latest issued query (trimmed); empty when idle
    query: String,
    /// Sequence number of the latest issued query
    seq: u64,
    /// Sequence number awaiting a worker response
    pending: Option<u64>,
    disposed: bool,
}

struct Inner {
    config: SearchConfig,
    runtime: tokio::runtime::Handle,
    spawner: Option<Arc<dyn WorkerSpawner>>,
    shutdown: CancellationToken,
    debouncer: Debouncer,
    core: Mutex<Core>,
    history: Mutex<SearchHistory>,
    state: watch::Sender<SearchState>,
}

/// The search subsystem: fuzzy index, filters, debounced execution on a
/// worker or in-process, and query history.
pub struct SearchSession {
    inner: Arc<Inner>,
}

impl SearchSession {
    /// Create a session. `spawner` is `None` when the host environment cannot
    /// run background workers. History is loaded from `store` immediately.
    pub fn new(config: SearchConfig, spawner: Option<Arc<dyn WorkerSpawner>>, store: Arc<dyn KeyValueStore>) -> Self {
        let config = config.normalized();
        let runtime = tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone());
        let shutdown = CancellationToken::new();
        let debouncer = Debouncer::new(config.debounce(), runtime.clone(), shutdown.clone());
        let history = SearchHistory::load(store, config.history_key.clone(), config.history_limit);

        let (state, _) = watch::channel(SearchState {
            search_history: history.entries().to_vec(),
            ..SearchState::default()
        });

        let core = Core {
            view: DocumentView::default(),
            strategy: ExecutionStrategy::new(config.clone()),
            criteria: FilterCriteria::default(),
            query: String::new(),
            seq: 0,
            pending: None,
            disposed: false,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                spawner,
                shutdown,
                debouncer,
                core: Mutex::new(core),
                history: Mutex::new(history),
                state,
            }),
        }
    }

    /// Session whose worker runs on a dedicated OS thread
    pub fn with_thread_worker(config: SearchConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(config, Some(Arc::new(ThreadWorkerSpawner::default())), store)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    /// Load the corpus. The first call also picks the execution backend;
    /// later calls behave like [`SearchSession::update_corpus`].
    pub fn initialize(&self, corpus: &[Document]) {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        if core.disposed {
            return;
        }
        if core.strategy.is_initialized() {
            drop(core);
            self.update_corpus(corpus);
            return;
        }

        core.view = DocumentView::new(corpus);
        let core_ref = &mut *core;
        let initialized = core_ref.strategy.initialize(&core_ref.view, inner.spawner.as_deref());
        if let Some((worker_id, responses)) = initialized.responses {
            inner.spawn_pump(worker_id, responses);
        }
        tracing::debug!(mode = core.strategy.mode_name(), documents = core.view.len(), "search session initialized");

        let filter_options = core.view.filter_options();
        let is_using_worker = core.strategy.is_using_worker();
        let search_error = initialized.error.map(|e| e.to_string());
        inner.publish(|s| {
            s.filter_options = filter_options;
            s.is_using_worker = is_using_worker;
            s.search_error = search_error;
        });

        inner.rerun(core);
    }

    /// Replace the corpus: rebuild the view and the active backend's index,
    /// then re-run the active query.
    pub fn update_corpus(&self, corpus: &[Document]) {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        if core.disposed {
            return;
        }
        if !core.strategy.is_initialized() {
            drop(core);
            self.initialize(corpus);
            return;
        }

        core.view = DocumentView::new(corpus);
        let core_ref = &mut *core;
        if let Err(e) = core_ref.strategy.rebuild(&core_ref.view) {
            tracing::warn!(error = %e, "failed to rebuild search index");
            if core_ref.strategy.is_using_worker() {
                inner.worker_failed(core_ref, e, None, false);
            }
        }

        let filter_options = core.view.filter_options();
        inner.publish(|s| s.filter_options = filter_options);
        inner.rerun(core);
    }

    /// Start a debounced search. Empty or too-short queries clear the
    /// results immediately.
    pub fn search(&self, query: &str) {
        let inner = &self.inner;
        let trimmed = query.trim();
        let mut core = inner.core.lock();
        if core.disposed {
            return;
        }
        core.seq += 1;
        let seq = core.seq;

        if trimmed.chars().count() < inner.config.min_query_length {
            inner.debouncer.cancel();
            core.query.clear();
            core.pending = None;
            let results = browse_results(&core);
            inner.publish(|s| {
                s.query.clear();
                s.results = results;
                s.is_searching = false;
            });
            return;
        }

        core.query = trimmed.to_string();
        if !core.strategy.is_available() {
            inner.debouncer.cancel();
            inner.fail(&mut core, SearchError::NotAvailable);
            return;
        }
        drop(core);

        let weak = Arc::downgrade(inner);
        inner.debouncer.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                inner.execute(seq);
            }
        });
    }

    /// Apply structural filters and re-run the active query right away
    pub fn filter(&self, criteria: FilterCriteria) {
        let mut core = self.inner.core.lock();
        if core.disposed {
            return;
        }
        core.criteria = criteria;
        self.inner.rerun(core);
    }

    pub fn add_to_history(&self, query: &str) {
        let mut history = self.inner.history.lock();
        if history.add(query) {
            let entries = history.entries().to_vec();
            self.inner.publish(|s| s.search_history = entries);
        }
    }

    pub fn clear_history(&self) {
        let mut history = self.inner.history.lock();
        history.clear();
        self.inner.publish(|s| s.search_history.clear());
    }

    /// Current reactive state
    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn is_using_worker(&self) -> bool {
        self.inner.core.lock().strategy.is_using_worker()
    }

    /// Tear down: cancel timers, stop the worker, ignore late responses.
    pub fn dispose(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        if core.disposed {
            return;
        }
        core.disposed = true;
        core.pending = None;
        inner.shutdown.cancel();
        inner.debouncer.cancel();
        core.strategy.terminate();
        inner.publish(|s| {
            s.is_searching = false;
            s.is_using_worker = false;
        });
        tracing::debug!("search session disposed");
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Results shown without a query: the filtered view when filters are active,
/// otherwise nothing.
fn browse_results(core: &Core) -> Vec<SearchResult> {
    if !core.criteria.is_active() || core.view.is_empty() {
        return Vec::new();
    }
    apply_filters(core.view.documents(), &core.criteria)
        .into_iter()
        .map(|document| SearchResult {
            document,
            score: UNRANKED_SCORE,
            matches: Vec::new(),
        })
        .collect()
}

impl Inner {
    fn publish(&self, update: impl FnOnce(&mut SearchState)) {
        self.state.send_modify(update);
    }

    /// Re-issue the active query immediately (no debounce) under a new
    /// sequence number.
    fn rerun(self: &Arc<Self>, mut core: MutexGuard<'_, Core>) {
        core.seq += 1;
        let seq = core.seq;
        self.debouncer.cancel();

        if core.query.is_empty() {
            core.pending = None;
            let results = browse_results(&core);
            self.publish(|s| {
                s.query.clear();
                s.results = results;
                s.is_searching = false;
            });
            return;
        }
        self.execute_locked(core, seq, false);
    }

    /// Debounce timer fired for `seq`
    fn execute(self: &Arc<Self>, seq: u64) {
        let core = self.core.lock();
        if core.disposed || core.seq != seq {
            return;
        }
        self.execute_locked(core, seq, true);
    }

    /// Dispatch `seq` to the active backend. In-process matching runs on the
    /// blocking pool when `offload` is set (timer and pump tasks), otherwise
    /// on the calling thread.
    fn execute_locked(self: &Arc<Self>, mut core: MutexGuard<'_, Core>, seq: u64, offload: bool) {
        let query = core.query.clone();
        let criteria = core.criteria.clone();

        match core.strategy.dispatch(seq, &query, &criteria) {
            Ok(DispatchPlan::Local(index)) => {
                core.pending = None;
                self.publish(|s| s.is_searching = true);
                drop(core);

                if offload {
                    let inner = Arc::clone(self);
                    self.runtime.spawn_blocking(move || {
                        let outcome = run_guarded(&index, &query, &criteria);
                        inner.finish_local(seq, &query, outcome);
                    });
                } else {
                    let outcome = run_guarded(&index, &query, &criteria);
                    self.finish_local(seq, &query, outcome);
                }
            }
            Ok(DispatchPlan::Sent { worker_id }) => {
                core.pending = Some(seq);
                self.publish(|s| s.is_searching = true);
                drop(core);
                self.arm_timeout(seq, worker_id);
            }
            Err(e) if core.strategy.is_using_worker() => {
                tracing::error!(error = %e, "failed to reach search worker");
                core.pending = Some(seq);
                self.worker_failed(&mut core, e, Some(seq), false);
            }
            Err(e) => self.fail(&mut core, e),
        }
    }

    fn finish_local(&self, seq: u64, query: &str, outcome: Result<Vec<SearchResult>, SearchError>) {
        let mut core = self.core.lock();
        if core.disposed || core.seq != seq {
            tracing::debug!(seq, "discarding superseded in-process result");
            return;
        }
        match outcome {
            Ok(results) => self.succeed(query, results),
            Err(e) => self.fail(&mut core, e),
        }
    }

    fn succeed(&self, query: &str, results: Vec<SearchResult>) {
        let query = query.to_string();
        self.publish(|s| {
            s.query = query;
            s.results = results;
            s.is_searching = false;
            s.search_error = None;
        });
    }

    /// The current query failed: clear results and surface the error
    fn fail(&self, core: &mut Core, error: SearchError) {
        tracing::warn!(error = %error, query = %core.query, "search failed");
        core.pending = None;
        let query = core.query.clone();
        let message = error.to_string();
        self.publish(|s| {
            s.query = query;
            s.results.clear();
            s.is_searching = false;
            s.search_error = Some(message);
        });
    }

    /// Worker error, exit or timeout while `failed_seq` was in flight.
    ///
    /// The failed query is not retried. Returns the latest query when it was
    /// in flight on a worker that is now gone and must be dispatched again.
    fn worker_failed(&self, core: &mut Core, error: SearchError, failed_seq: Option<u64>, worker_alive: bool) -> Option<u64> {
        core.strategy.fall_back(&core.view, worker_alive);
        let still_on_worker = core.strategy.is_using_worker();

        let pending_failed = core.pending.is_some() && core.pending == failed_seq;
        let orphaned = core
            .pending
            .filter(|&pending| !still_on_worker && !pending_failed && pending == core.seq);
        if pending_failed || !still_on_worker {
            core.pending = None;
        }

        let query = core.query.clone();
        let message = error.to_string();
        self.publish(|s| {
            s.is_using_worker = still_on_worker;
            s.search_error = Some(message);
            if pending_failed {
                s.query = query;
                s.results.clear();
                s.is_searching = false;
            }
        });
        orphaned
    }

    fn spawn_pump(self: &Arc<Self>, worker_id: u64, mut responses: UnboundedReceiver<WorkerResponse>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                let response = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    response = responses.recv() => response,
                };
                let Some(inner) = weak.upgrade() else { break };
                match response {
                    Some(response) => inner.on_worker_response(worker_id, response),
                    None => {
                        inner.on_worker_exit(worker_id);
                        break;
                    }
                }
            }
        });
    }

    fn on_worker_response(self: &Arc<Self>, worker_id: u64, response: WorkerResponse) {
        let mut core = self.core.lock();
        if core.disposed || core.strategy.worker_id() != Some(worker_id) {
            return;
        }

        match response {
            WorkerResponse::Ready { document_count } => {
                tracing::debug!(worker_id, document_count, "search worker ready");
            }
            WorkerResponse::Result { seq, results } => {
                if core.seq != seq || core.pending != Some(seq) {
                    tracing::debug!(seq, latest = core.seq, "discarding stale worker result");
                    return;
                }
                core.pending = None;
                let query = core.query.clone();
                self.succeed(&query, results);
            }
            WorkerResponse::Error { seq: Some(seq), message } if core.seq != seq || core.pending != Some(seq) => {
                tracing::warn!(worker_id, seq, latest = core.seq, %message, "ignoring worker error for superseded query");
            }
            WorkerResponse::Error { seq, message } => {
                tracing::error!(worker_id, ?seq, %message, "search worker reported an error");
                if let Some(retry) = self.worker_failed(&mut core, SearchError::Worker(message), seq, true) {
                    self.execute_locked(core, retry, true);
                }
            }
        }
    }

    fn on_worker_exit(&self, worker_id: u64) {
        let mut core = self.core.lock();
        if core.disposed || core.strategy.worker_id() != Some(worker_id) {
            return;
        }
        tracing::error!(worker_id, "search worker exited unexpectedly");
        // Whatever was in flight died with the worker
        let in_flight = core.pending;
        self.worker_failed(&mut core, SearchError::Worker("worker exited".to_string()), in_flight, false);
    }

    fn arm_timeout(self: &Arc<Self>, seq: u64, worker_id: u64) {
        let Some(timeout) = self.config.worker_timeout() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_worker_timeout(seq, worker_id, timeout);
                    }
                }
            }
        });
    }

    fn on_worker_timeout(&self, seq: u64, worker_id: u64, timeout: Duration) {
        let mut core = self.core.lock();
        if core.disposed || core.strategy.worker_id() != Some(worker_id) || core.pending != Some(seq) {
            return;
        }
        tracing::error!(worker_id, seq, ?timeout, "search worker timed out");
        self.worker_failed(&mut core, SearchError::WorkerTimeout(timeout), Some(seq), true);
    }
}
