//! Command-line front end: fuzzy-search a JSON notes export.
//!
//! Usage:
//!     notes-search notes.json "reakt hooks" --tag frontend --pinned
//!
//! The corpus is a JSON array of notes (`id`, `title`, `content`, `tags`,
//! `notebook`, `isPinned`, `isTrashed`, `createdAt`, `updatedAt`).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use notes_search::{
    highlight_matches_with, DateRange, Document, FilterCriteria, KeyValueStore, MemoryStore, SearchConfig, SearchField,
    SearchSession, SearchState, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HIGHLIGHT_ON: &str = "\x1b[1;33m";
const HIGHLIGHT_OFF: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file containing an array of notes
    corpus: PathBuf,

    /// Search query (omit to list notes matching the filters)
    query: Option<String>,

    /// Restrict to a notebook (repeatable, any-of)
    #[arg(short, long)]
    notebook: Vec<String>,

    /// Require a tag (repeatable, all-of)
    #[arg(short, long)]
    tag: Vec<String>,

    /// Only pinned notes
    #[arg(long, conflicts_with = "unpinned")]
    pinned: bool,

    /// Only unpinned notes
    #[arg(long)]
    unpinned: bool,

    /// Earliest last-modified time (RFC 3339)
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Latest last-modified time (RFC 3339)
    #[arg(long)]
    until: Option<DateTime<Utc>>,

    /// Match threshold: 0.0 exact only, 1.0 matches anything
    #[arg(long)]
    threshold: Option<f64>,

    /// JSON file with a (partial) search configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Match in-process instead of on a worker thread
    #[arg(long)]
    no_worker: bool,

    /// SQLite database for persisted search history
    #[arg(long)]
    history_db: Option<PathBuf>,

    /// Print the stored search history and exit
    #[arg(long)]
    show_history: bool,

    /// Maximum number of results to print
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

impl Args {
    fn criteria(&self) -> FilterCriteria {
        let is_pinned = match (self.pinned, self.unpinned) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let date_range = (self.since.is_some() || self.until.is_some()).then(|| DateRange {
            start: self.since,
            end: self.until,
        });
        FilterCriteria {
            notebooks: self.notebook.clone(),
            tags: self.tag.clone(),
            is_pinned,
            date_range,
        }
    }

    fn search_config(&self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
                SearchConfig::from_json(&raw)?
            }
            None => SearchConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.matching.threshold = threshold;
        }
        if self.no_worker {
            config.use_worker = false;
        }
        Ok(config.normalized())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "notes_search=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let store: Arc<dyn KeyValueStore> = match &args.history_db {
        Some(path) => Arc::new(SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?),
        None => Arc::new(MemoryStore::new()),
    };

    let raw = std::fs::read_to_string(&args.corpus).with_context(|| format!("reading {}", args.corpus.display()))?;
    let corpus: Vec<Document> = serde_json::from_str(&raw).context("parsing notes corpus")?;
    tracing::info!(notes = corpus.len(), "loaded corpus");

    let session = SearchSession::with_thread_worker(args.search_config()?, store);

    if args.show_history {
        for (i, entry) in session.state().search_history.iter().enumerate() {
            println!("{:>2}. {}", i + 1, entry);
        }
        return Ok(());
    }

    let mut updates = session.subscribe();
    session.initialize(&corpus);
    session.filter(args.criteria());

    let query = args.query.as_deref().map(str::trim).unwrap_or_default();
    let state = if query.chars().count() >= session.config().min_query_length {
        session.search(query);
        let state = tokio::time::timeout(
            Duration::from_secs(30),
            updates.wait_for(|s| s.query == query && !s.is_searching),
        )
        .await
        .context("search timed out")?
        .context("search session closed")?
        .clone();
        session.add_to_history(query);
        state
    } else {
        session.state()
    };

    if let Some(error) = &state.search_error {
        if state.results.is_empty() {
            bail!("{}", error);
        }
    }
    print_results(&state, args.limit);
    session.dispose();
    Ok(())
}

fn print_results(state: &SearchState, limit: usize) {
    if state.results.is_empty() {
        println!("No matching notes.");
        return;
    }

    println!(
        "{} result(s){}",
        state.results.len(),
        if state.is_using_worker { " [worker]" } else { "" }
    );
    for (rank, result) in state.results.iter().take(limit).enumerate() {
        let doc = &result.document;
        let title = highlight_matches_with(&doc.title, &result.matches, HIGHLIGHT_ON, HIGHLIGHT_OFF);
        println!("{:>3}. {}  ({:.3})", rank + 1, title, result.score);

        let mut meta = Vec::new();
        if !doc.notebook.is_empty() {
            meta.push(format!("notebook: {}", doc.notebook));
        }
        if !doc.tags.is_empty() {
            meta.push(format!("tags: {}", doc.tags.join(", ")));
        }
        if doc.is_pinned {
            meta.push("pinned".to_string());
        }
        if !meta.is_empty() {
            println!("     {}", meta.join(" | "));
        }

        for m in result.matches.iter().filter(|m| m.key == SearchField::Content) {
            let highlighted = highlight_matches_with(&m.field_value, std::slice::from_ref(m), HIGHLIGHT_ON, HIGHLIGHT_OFF);
            if let Some(line) = highlighted.lines().find(|line| line.contains(HIGHLIGHT_ON)) {
                println!("     {}", line.trim());
            }
        }
    }
}
