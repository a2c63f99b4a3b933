//! Structural filters over documents and ranked results.
//!
//! Everything here is pure so the worker and the main thread produce identical
//! output for the same input.

use crate::interface::{Document, FilterCriteria, SearchResult};

/// Whether `document` passes every active criterion (logical AND).
pub fn matches_criteria(document: &Document, criteria: &FilterCriteria) -> bool {
    if !criteria.notebooks.is_empty() && !criteria.notebooks.iter().any(|n| *n == document.notebook) {
        return false;
    }

    // Tags are AND: every required tag must be present
    if !criteria.tags.iter().all(|required| document.tags.iter().any(|t| t == required)) {
        return false;
    }

    if let Some(pinned) = criteria.is_pinned {
        if document.is_pinned != pinned {
            return false;
        }
    }

    if let Some(range) = criteria.date_range {
        let timestamp = document.effective_timestamp();
        if range.start.is_some_and(|start| timestamp < start) {
            return false;
        }
        if range.end.is_some_and(|end| timestamp > end) {
            return false;
        }
    }

    true
}

/// Narrow `documents` to those passing `criteria`, preserving order.
pub fn apply_filters(documents: &[Document], criteria: &FilterCriteria) -> Vec<Document> {
    if !criteria.is_active() {
        return documents.to_vec();
    }
    documents.iter().filter(|d| matches_criteria(d, criteria)).cloned().collect()
}

/// Narrow ranked results without disturbing their order.
pub fn filter_results(results: Vec<SearchResult>, criteria: &FilterCriteria) -> Vec<SearchResult> {
    if !criteria.is_active() {
        return results;
    }
    results.into_iter().filter(|r| matches_criteria(&r.document, criteria)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::DateRange;
    use chrono::{Duration, TimeZone, Utc};

    fn corpus() -> Vec<Document> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![
            Document::new("1", "Hooks", "", base)
                .with_tags(["react", "javascript"])
                .with_notebook("work")
                .pinned(true),
            Document::new("2", "Ownership", "", base + Duration::days(10))
                .with_tags(["rust"])
                .with_notebook("work"),
            Document::new("3", "Groceries", "", base)
                .with_tags(["react"])
                .with_notebook("home")
                .with_updated_at(base + Duration::days(20)),
            Document::new("4", "Typescript", "", base + Duration::days(30))
                .with_tags(["javascript", "typescript"])
                .with_notebook("home"),
        ]
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_no_criteria_is_identity() {
        let docs = corpus();
        assert_eq!(apply_filters(&docs, &FilterCriteria::default()), docs);
    }

    #[test]
    fn test_tags_use_and_semantics() {
        let docs = corpus();
        let both = FilterCriteria {
            tags: vec!["react".into(), "javascript".into()],
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&docs, &both)), vec!["1"]);

        let three = FilterCriteria {
            tags: vec!["react".into(), "javascript".into(), "css".into()],
            ..Default::default()
        };
        assert!(apply_filters(&docs, &three).is_empty());
    }

    #[test]
    fn test_notebook_membership() {
        let criteria = FilterCriteria {
            notebooks: vec!["home".into()],
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&corpus(), &criteria)), vec!["3", "4"]);
    }

    #[test]
    fn test_pinned_exact_match() {
        let docs = corpus();
        let pinned = FilterCriteria { is_pinned: Some(true), ..Default::default() };
        assert_eq!(ids(&apply_filters(&docs, &pinned)), vec!["1"]);
        let unpinned = FilterCriteria { is_pinned: Some(false), ..Default::default() };
        assert_eq!(ids(&apply_filters(&docs, &unpinned)), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_date_range_prefers_updated_at_and_is_inclusive() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let criteria = FilterCriteria {
            date_range: Some(DateRange {
                start: Some(base + Duration::days(10)),
                end: Some(base + Duration::days(20)),
            }),
            ..Default::default()
        };
        // "3" was created on day 0 but updated on day 20
        assert_eq!(ids(&apply_filters(&corpus(), &criteria)), vec!["2", "3"]);
    }

    #[test]
    fn test_open_ended_date_range() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let criteria = FilterCriteria {
            date_range: Some(DateRange { start: Some(base + Duration::days(15)), end: None }),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&corpus(), &criteria)), vec!["3", "4"]);
    }

    #[test]
    fn test_criteria_combine_with_and() {
        let criteria = FilterCriteria {
            notebooks: vec!["work".into()],
            tags: vec!["react".into()],
            is_pinned: Some(true),
            date_range: None,
        };
        assert_eq!(ids(&apply_filters(&corpus(), &criteria)), vec!["1"]);
    }
}
