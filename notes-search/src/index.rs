//! Weighted multi-field fuzzy index.
//!
//! The index is immutable: a corpus change means building a new one. Field
//! text is folded and normed once at build time; queries are scored against
//! every document in parallel with rayon.

use crate::config::MatchOptions;
use crate::filter::filter_results;
use crate::interface::{Document, FieldMatch, FilterCriteria, SearchField, SearchResult};
use crate::ranking::{field_norm, fold_chars, score_field, weighted_factor};
use rayon::prelude::*;

/// One searchable value of a document with its precomputed matching state
#[derive(Debug, Clone)]
struct IndexedField {
    key: SearchField,
    value: String,
    folded: Vec<char>,
    norm: f64,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: Document,
    fields: Vec<IndexedField>,
}

#[derive(Debug, Clone)]
pub struct FuzzyIndex {
    entries: Vec<IndexedDocument>,
    options: MatchOptions,
}

impl FuzzyIndex {
    /// Build an index over `documents`. Trashed documents are skipped even if
    /// the caller passed them in.
    pub fn build(documents: &[Document], options: &MatchOptions) -> Self {
        let options = options.normalized();
        let entries = documents
            .iter()
            .filter(|d| !d.is_trashed)
            .map(|d| IndexedDocument {
                fields: index_fields(d, &options),
                document: d.clone(),
            })
            .collect();
        Self { entries, options }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank documents against `query`, best (lowest score) first.
    /// Ties keep corpus order.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let pattern = fold_chars(trimmed);

        #[cfg(feature = "perf-log")]
        let t0 = std::time::Instant::now();

        let mut scored: Vec<(usize, SearchResult)> = self
            .entries
            .par_iter()
            .enumerate()
            .filter_map(|(rank, entry)| self.score_document(entry, &pattern).map(|r| (rank, r)))
            .collect();

        scored.sort_by(|(ra, a), (rb, b)| a.score.total_cmp(&b.score).then_with(|| ra.cmp(rb)));

        #[cfg(feature = "perf-log")]
        tracing::debug!(
            elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0,
            documents = self.entries.len(),
            hits = scored.len(),
            "[perf] fuzzy search"
        );

        scored.into_iter().map(|(_, r)| r).collect()
    }

    /// Search, then apply structural filters to the ranked hits
    pub fn search_filtered(&self, query: &str, criteria: &FilterCriteria) -> Vec<SearchResult> {
        filter_results(self.search(query), criteria)
    }

    fn score_document(&self, entry: &IndexedDocument, pattern: &[char]) -> Option<SearchResult> {
        let mut total = 1.0_f64;
        let mut matches = Vec::new();

        for field in &entry.fields {
            let Some(hit) = score_field(pattern, &field.folded, self.options.threshold, self.options.min_match_char_length) else {
                continue;
            };
            let norm = if self.options.ignore_field_norm { 1.0 } else { field.norm };
            total *= weighted_factor(hit.score, self.options.weights.get(field.key), norm);
            matches.push(FieldMatch {
                key: field.key,
                field_value: field.value.clone(),
                ranges: hit.ranges,
            });
        }

        if matches.is_empty() {
            return None;
        }
        Some(SearchResult {
            document: entry.document.clone(),
            score: total.clamp(0.0, 1.0),
            matches,
        })
    }
}

/// Searchable values of a document; zero-weight fields are not indexed.
fn index_fields(document: &Document, options: &MatchOptions) -> Vec<IndexedField> {
    let mut values: Vec<(SearchField, &str)> = vec![
        (SearchField::Title, document.title.as_str()),
        (SearchField::Content, document.content.as_str()),
    ];
    values.extend(document.tags.iter().map(|t| (SearchField::Tags, t.as_str())));
    values.push((SearchField::Notebook, document.notebook.as_str()));

    values
        .into_iter()
        .filter(|(key, value)| !value.is_empty() && options.weights.get(*key) > 0.0)
        .map(|(key, value)| IndexedField {
            key,
            value: value.to_string(),
            folded: fold_chars(value),
            norm: field_norm(value),
        })
        .collect()
}
