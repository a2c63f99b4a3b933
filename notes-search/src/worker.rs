//! Background search worker.
//!
//! The worker owns its own copy of the documents and its own index; nothing is
//! shared with the session except the two message channels. Messages are a
//! tagged union (`{"type": ..., "payload": ...}`) so the protocol stays the
//! same whether the worker is a thread, a process or a foreign runtime.

use crate::config::MatchOptions;
use crate::index::FuzzyIndex;
use crate::interface::{Document, FilterCriteria, SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Session → worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    /// (Re)build the worker's index from a fresh document view
    Initialize { documents: Vec<Document>, options: MatchOptions },
    Search { seq: u64, query: String, criteria: FilterCriteria },
    Terminate,
}

/// Worker → session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    Ready { document_count: usize },
    Result { seq: u64, results: Vec<SearchResult> },
    Error { seq: Option<u64>, message: String },
}

/// Session-side end of a live worker.
pub struct WorkerHandle {
    id: u64,
    requests: UnboundedSender<WorkerRequest>,
    responses: Option<UnboundedReceiver<WorkerResponse>>,
}

impl WorkerHandle {
    /// Wrap the channels of an already running worker
    pub fn from_channels(requests: UnboundedSender<WorkerRequest>, responses: UnboundedReceiver<WorkerResponse>) -> Self {
        Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            requests,
            responses: Some(responses),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send(&self, request: WorkerRequest) -> Result<(), SearchError> {
        self.requests
            .send(request)
            .map_err(|_| SearchError::Worker("worker channel closed".to_string()))
    }

    /// Hand the response stream to whoever pumps it. Only the first call gets it.
    pub fn take_responses(&mut self) -> Option<UnboundedReceiver<WorkerResponse>> {
        self.responses.take()
    }

    pub fn terminate(&self) {
        // A worker that already exited has dropped its receiver
        let _ = self.requests.send(WorkerRequest::Terminate);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Environment capable of starting a worker.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self) -> Result<WorkerHandle, SearchError>;
}

/// Runs the worker on a dedicated OS thread.
#[derive(Debug, Clone)]
pub struct ThreadWorkerSpawner {
    thread_name: String,
}

impl Default for ThreadWorkerSpawner {
    fn default() -> Self {
        Self {
            thread_name: "notes-search-worker".to_string(),
        }
    }
}

impl WorkerSpawner for ThreadWorkerSpawner {
    fn spawn(&self) -> Result<WorkerHandle, SearchError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_worker(request_rx, response_tx))
            .map_err(|e| SearchError::InitializationFailed { reason: e.to_string() })?;

        Ok(WorkerHandle::from_channels(request_tx, response_rx))
    }
}

/// Worker event loop. Blocks the calling thread until `Terminate` arrives or
/// either channel closes.
pub fn run_worker(mut requests: UnboundedReceiver<WorkerRequest>, responses: UnboundedSender<WorkerResponse>) {
    let mut index: Option<FuzzyIndex> = None;

    while let Some(request) = requests.blocking_recv() {
        let response = match request {
            WorkerRequest::Initialize { documents, options } => {
                let built = FuzzyIndex::build(&documents, &options);
                let document_count = built.len();
                index = Some(built);
                tracing::debug!(document_count, "search worker index built");
                WorkerResponse::Ready { document_count }
            }
            WorkerRequest::Search { seq, query, criteria } => match &index {
                Some(index) => match run_guarded(index, &query, &criteria) {
                    Ok(results) => WorkerResponse::Result { seq, results },
                    Err(e) => WorkerResponse::Error { seq: Some(seq), message: e.to_string() },
                },
                None => WorkerResponse::Error {
                    seq: Some(seq),
                    message: SearchError::NotInitialized.to_string(),
                },
            },
            WorkerRequest::Terminate => break,
        };

        if responses.send(response).is_err() {
            break;
        }
    }
    tracing::debug!("search worker stopped");
}

/// Run one query, turning a panic inside the matcher into an error
pub fn run_guarded(index: &FuzzyIndex, query: &str, criteria: &FilterCriteria) -> Result<Vec<SearchResult>, SearchError> {
    catch_unwind(AssertUnwindSafe(|| index.search_filtered(query, criteria))).map_err(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "matcher panicked".to_string());
        SearchError::Match(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("1", "Rust ownership", "borrowing rules", Utc::now()),
            Document::new("2", "Old note", "", Utc::now()).trashed(true),
        ]
    }

    #[test]
    fn test_protocol_is_tagged_union() {
        let request = WorkerRequest::Search {
            seq: 7,
            query: "rust".to_string(),
            criteria: FilterCriteria::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "SEARCH");
        assert_eq!(json["payload"]["seq"], 7);
        assert_eq!(json["payload"]["query"], "rust");

        let json = serde_json::to_value(WorkerRequest::Terminate).unwrap();
        assert_eq!(json["type"], "TERMINATE");

        let response: WorkerResponse =
            serde_json::from_str(r#"{"type":"ERROR","payload":{"seq":3,"message":"boom"}}"#).unwrap();
        assert_eq!(response, WorkerResponse::Error { seq: Some(3), message: "boom".to_string() });
    }

    #[tokio::test]
    async fn test_thread_worker_round_trip() {
        let mut handle = ThreadWorkerSpawner::default().spawn().unwrap();
        let mut responses = handle.take_responses().unwrap();
        assert!(handle.take_responses().is_none());

        handle
            .send(WorkerRequest::Initialize { documents: docs(), options: MatchOptions::default() })
            .unwrap();
        assert_eq!(responses.recv().await, Some(WorkerResponse::Ready { document_count: 1 }));

        handle
            .send(WorkerRequest::Search { seq: 1, query: "ownership".into(), criteria: FilterCriteria::default() })
            .unwrap();
        match responses.recv().await {
            Some(WorkerResponse::Result { seq, results }) => {
                assert_eq!(seq, 1);
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].document.id, "1");
            }
            other => panic!("unexpected response: {:?}", other),
        }

        handle.terminate();
        assert_eq!(responses.recv().await, None);
    }

    #[tokio::test]
    async fn test_search_before_initialize_is_error() {
        let mut handle = ThreadWorkerSpawner::default().spawn().unwrap();
        let mut responses = handle.take_responses().unwrap();
        handle
            .send(WorkerRequest::Search { seq: 4, query: "x".into(), criteria: FilterCriteria::default() })
            .unwrap();
        match responses.recv().await {
            Some(WorkerResponse::Error { seq, .. }) => assert_eq!(seq, Some(4)),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_run_guarded_passes_results_through() {
        let index = FuzzyIndex::build(&docs(), &MatchOptions::default());
        let results = run_guarded(&index, "rust", &FilterCriteria::default()).unwrap();
        assert_eq!(results.len(), 1);
    }
}
