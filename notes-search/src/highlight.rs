//! Highlight reconstruction for rendered fields.
//!
//! Ranges are inclusive character offsets into the exact field value they were
//! produced for. Overlapping or touching ranges are merged into one span, then
//! markers are inserted from the highest offset down so earlier insertions
//! never shift the offsets still to be processed.

use crate::interface::{FieldMatch, MatchRange};

pub const DEFAULT_OPEN_MARK: &str = "<mark>";
pub const DEFAULT_CLOSE_MARK: &str = "</mark>";

/// Wrap every matched range of `text` in `<mark>` tags.
/// Returns `text` unchanged when no match applies to it.
pub fn highlight_matches(text: &str, matches: &[FieldMatch]) -> String {
    highlight_matches_with(text, matches, DEFAULT_OPEN_MARK, DEFAULT_CLOSE_MARK)
}

/// Same as [`highlight_matches`] with caller-chosen markers
pub fn highlight_matches_with(text: &str, matches: &[FieldMatch], open: &str, close: &str) -> String {
    let ranges: Vec<MatchRange> = matches
        .iter()
        .filter(|m| m.field_value == text)
        .flat_map(|m| m.ranges.iter().copied())
        .collect();
    if ranges.is_empty() {
        return text.to_string();
    }

    let char_count = text.chars().count();
    let mut spans = merge_ranges(ranges, char_count);
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_unstable_by(|a, b| b.start.cmp(&a.start));

    // Byte offset of every char boundary, including the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut marked = text.to_string();
    for span in spans {
        marked.insert_str(boundaries[span.end + 1], close);
        marked.insert_str(boundaries[span.start], open);
    }
    marked
}

/// Clamp to the text, drop empty or inverted ranges, merge overlaps and
/// adjacent ranges. Output is sorted ascending.
fn merge_ranges(mut ranges: Vec<MatchRange>, char_count: usize) -> Vec<MatchRange> {
    ranges.retain(|r| r.start <= r.end && r.start < char_count);
    for r in ranges.iter_mut() {
        r.end = r.end.min(char_count - 1);
    }
    ranges.sort_unstable_by_key(|r| r.start);

    let mut merged: Vec<MatchRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(last) if r.start <= last.end + 1 => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}
