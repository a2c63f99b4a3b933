//! Shared fixtures: a small notes corpus, scripted worker spawners and a
//! helper that waits for a query to settle.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use notes_search::{
    Document, FuzzyIndex, SearchError, SearchSession, SearchState, WorkerHandle, WorkerRequest, WorkerResponse,
    WorkerSpawner,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn date(day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn notes() -> Vec<Document> {
    vec![
        Document::new("1", "React Development Guide", "A comprehensive guide to hooks and components", date(1))
            .with_tags(["react", "javascript"])
            .with_notebook("Work")
            .pinned(true),
        Document::new("2", "Shopping List", "milk, eggs, bread", date(2))
            .with_tags(["personal"])
            .with_notebook("Home")
            .trashed(true),
        Document::new("3", "Vue notes", "template syntax and directives", date(3))
            .with_tags(["javascript", "vue"])
            .with_notebook("Work"),
        Document::new("4", "React Native setup", "simulator and metro bundler", date(4))
            .with_tags(["react", "mobile"])
            .with_notebook("Side Projects")
            .with_updated_at(date(20)),
        Document::new("5", "Alpha release checklist", "ship it", date(5))
            .with_tags(["release"])
            .with_notebook("Work"),
        Document::new("6", "Beta feedback", "collected test reports from users", date(6)).with_notebook("Personal"),
        Document::new("7", "Meeting notes", "discuss the test plan", date(7)).with_notebook("Work"),
    ]
}

pub fn ids(state: &SearchState) -> Vec<&str> {
    state.results.iter().map(|r| r.document.id.as_str()).collect()
}

/// Wait until the results for `query` are published and nothing is in flight.
pub async fn settle(session: &SearchSession, query: &str) -> SearchState {
    let mut updates = session.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(10),
        updates.wait_for(|s| s.query == query && !s.is_searching),
    )
    .await
    .expect("search did not settle")
    .expect("session closed")
    .clone();
    state
}

/// Fails every spawn attempt
pub struct FailingSpawner;

impl WorkerSpawner for FailingSpawner {
    fn spawn(&self) -> Result<WorkerHandle, SearchError> {
        Err(SearchError::InitializationFailed {
            reason: "worker script failed to load".to_string(),
        })
    }
}

/// How a scripted worker answers `Search` requests
#[derive(Clone)]
pub enum Behavior {
    /// Answer right away with real results
    Answer,
    /// Per-query reply, possibly delayed
    Scripted(Arc<dyn Fn(&str) -> Reply + Send + Sync>),
    /// Report a matching error
    Fail,
    /// Never answer
    Silent,
    /// Exit the worker
    Exit,
}

/// Scripted reply to one query
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Answer(Duration),
    Fail(Duration),
    Never,
}

/// Spawns a worker thread that indexes for real but answers as scripted,
/// recording every query it receives.
#[derive(Clone)]
pub struct ScriptedSpawner {
    behavior: Behavior,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSpawner {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

impl WorkerSpawner for ScriptedSpawner {
    fn spawn(&self) -> Result<WorkerHandle, SearchError> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
        let behavior = self.behavior.clone();
        let queries = Arc::clone(&self.queries);

        std::thread::spawn(move || {
            let mut index: Option<Arc<FuzzyIndex>> = None;
            while let Some(request) = request_rx.blocking_recv() {
                match request {
                    WorkerRequest::Initialize { documents, options } => {
                        let built = FuzzyIndex::build(&documents, &options);
                        let document_count = built.len();
                        index = Some(Arc::new(built));
                        let _ = response_tx.send(WorkerResponse::Ready { document_count });
                    }
                    WorkerRequest::Search { seq, query, criteria } => {
                        queries.lock().push(query.clone());
                        let Some(index) = index.clone() else { continue };
                        match &behavior {
                            Behavior::Answer => {
                                let results = index.search_filtered(&query, &criteria);
                                let _ = response_tx.send(WorkerResponse::Result { seq, results });
                            }
                            Behavior::Scripted(reply_for) => {
                                let reply = reply_for(&query);
                                let tx = response_tx.clone();
                                std::thread::spawn(move || {
                                    let response = match reply {
                                        Reply::Answer(delay) => {
                                            std::thread::sleep(delay);
                                            let results = index.search_filtered(&query, &criteria);
                                            WorkerResponse::Result { seq, results }
                                        }
                                        Reply::Fail(delay) => {
                                            std::thread::sleep(delay);
                                            WorkerResponse::Error {
                                                seq: Some(seq),
                                                message: format!("cannot match {:?}", query),
                                            }
                                        }
                                        Reply::Never => return,
                                    };
                                    let _ = tx.send(response);
                                });
                            }
                            Behavior::Fail => {
                                let _ = response_tx.send(WorkerResponse::Error {
                                    seq: Some(seq),
                                    message: "matcher exploded".to_string(),
                                });
                            }
                            Behavior::Silent => {}
                            Behavior::Exit => break,
                        }
                    }
                    WorkerRequest::Terminate => break,
                }
            }
        });

        Ok(WorkerHandle::from_channels(request_tx, response_rx))
    }
}
