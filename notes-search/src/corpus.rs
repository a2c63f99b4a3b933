//! Document view: the searchable snapshot of the corpus.
//!
//! Module isolation ensures nothing outside this module can push a trashed
//! document into a view after construction.

use crate::interface::{Document, FilterOptions};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Snapshot of the corpus with trashed documents removed.
/// Cheap to clone; the documents are shared.
#[derive(Debug, Clone, Default)]
pub struct DocumentView {
    documents: Arc<Vec<Document>>,
}

impl DocumentView {
    pub fn new(corpus: &[Document]) -> Self {
        let documents: Vec<Document> = corpus.iter().filter(|d| !d.is_trashed).cloned().collect();
        Self {
            documents: Arc::new(documents),
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Distinct notebooks and tags, sorted, for filter pickers
    pub fn filter_options(&self) -> FilterOptions {
        let mut notebooks = BTreeSet::new();
        let mut tags = BTreeSet::new();
        for doc in self.documents.iter() {
            if !doc.notebook.is_empty() {
                notebooks.insert(doc.notebook.clone());
            }
            tags.extend(doc.tags.iter().filter(|t| !t.is_empty()).cloned());
        }
        FilterOptions {
            notebooks: notebooks.into_iter().collect(),
            tags: tags.into_iter().collect(),
        }
    }
}
