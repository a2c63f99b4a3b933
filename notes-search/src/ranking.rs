//! Approximate substring scoring for a single field value.
//!
//! A field is scored with Sellers' variant of the Levenshtein distance: the
//! first DP row is all zeros, so the query may align anywhere in the field.
//! The field score is `best_distance / query_len` (0 = exact substring).
//! Matched characters are recovered by traceback and grouped into inclusive
//! runs; runs shorter than the minimum match length never count.

use crate::interface::MatchRange;

/// Upper bound on highlighted occurrences per field value
const MAX_OCCURRENCES: usize = 100;

/// Lowercase one character per source character so offsets line up with the
/// original text.
pub(crate) fn fold_chars(text: &str) -> Vec<char> {
    text.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Largest edit distance a query of `pattern_len` chars may have
pub(crate) fn max_distance(pattern_len: usize, threshold: f64) -> u32 {
    (threshold * pattern_len as f64 + 1e-9).floor() as u32
}

/// Field-length norm: longer fields weigh less. Rounded like the score it feeds.
pub(crate) fn field_norm(text: &str) -> f64 {
    let tokens = text.split_whitespace().count().max(1) as f64;
    (1.0 / tokens.sqrt() * 1000.0).round() / 1000.0
}

/// Fold one field's score into the document score.
///
/// Scores multiply, each raised to `weight * norm`, so a small weight pulls a
/// field's contribution toward 1.0 (no effect) and a perfect hit toward 0.
pub(crate) fn weighted_factor(score: f64, weight: f64, norm: f64) -> f64 {
    let base = if score <= 0.0 { f64::EPSILON } else { score.min(1.0) };
    base.powf(weight * norm)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldScore {
    pub(crate) score: f64,
    pub(crate) ranges: Vec<MatchRange>,
}

/// Score `pattern` against `text` (both already folded).
/// Returns `None` when the best alignment exceeds the threshold or no matched
/// run reaches `min_run` characters.
pub(crate) fn score_field(pattern: &[char], text: &[char], threshold: f64, min_run: usize) -> Option<FieldScore> {
    let m = pattern.len();
    let n = text.len();
    if m == 0 || n == 0 || m < min_run {
        return None;
    }
    let allowed = max_distance(m, threshold);
    // Aligning a longer pattern costs at least the length difference
    if m > n + allowed as usize {
        return None;
    }

    let last = last_row(pattern, text);
    let best = last[1..].iter().copied().min()?;
    if best > allowed {
        return None;
    }

    // An alignment within `allowed` edits spans at most this many text chars
    let span = m + allowed as usize;
    let mut positions = Vec::new();
    let mut last_end: Option<usize> = None;
    let mut occurrences = 0;
    for end in occurrence_ends(&last, allowed) {
        let window = end.saturating_sub(span);
        let matrix = DistanceMatrix::compute(pattern, &text[window..end]);
        let (start, matched) = matrix.traceback(pattern, &text[window..end], end - window);
        let start = start + window;
        if last_end.is_some_and(|e| start <= e) {
            continue;
        }
        last_end = Some(end - 1);
        positions.extend(matched.into_iter().map(|p| p + window));
        occurrences += 1;
        if occurrences >= MAX_OCCURRENCES {
            break;
        }
    }

    let ranges = positions_to_ranges(&positions, min_run);
    if ranges.is_empty() {
        return None;
    }
    Some(FieldScore {
        score: best as f64 / m as f64,
        ranges,
    })
}

/// Group matched character positions into inclusive runs of at least `min_run`.
pub(crate) fn positions_to_ranges(positions: &[usize], min_run: usize) -> Vec<MatchRange> {
    if positions.is_empty() {
        return Vec::new();
    }
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut start = sorted[0];
    let mut end = start;
    for &pos in &sorted[1..] {
        if pos == end + 1 {
            end = pos;
        } else {
            ranges.push(MatchRange::new(start, end));
            start = pos;
            end = pos;
        }
    }
    ranges.push(MatchRange::new(start, end));
    ranges.retain(|r| r.len() >= min_run);
    ranges
}

/// Bottom DP row: `row[j]` is the best distance of `pattern` against any
/// substring of `text` ending before position `j`. Uses two rows of memory.
fn last_row(pattern: &[char], text: &[char]) -> Vec<u32> {
    let n = text.len();
    let mut prev = vec![0u32; n + 1];
    let mut row = vec![0u32; n + 1];

    for (i, &p) in pattern.iter().enumerate() {
        row[0] = i as u32 + 1;
        for j in 1..=n {
            let substitute = prev[j - 1] + u32::from(p != text[j - 1]);
            row[j] = substitute.min(prev[j] + 1).min(row[j - 1] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev
}

/// End positions (1-based, exclusive) of local minima within tolerance
fn occurrence_ends(last: &[u32], allowed: u32) -> Vec<usize> {
    let n = last.len() - 1;
    (1..=n)
        .filter(|&j| {
            let d = last[j];
            d <= allowed && (j == 1 || d < last[j - 1]) && (j == n || d <= last[j + 1])
        })
        .collect()
}

/// Full (m+1) x (k+1) distance table over a short text window, row-major.
struct DistanceMatrix {
    cells: Vec<u32>,
    rows: usize,
    width: usize,
}

impl DistanceMatrix {
    fn compute(pattern: &[char], text: &[char]) -> Self {
        let m = pattern.len();
        let n = text.len();
        let width = n + 1;
        let mut cells = vec![0u32; (m + 1) * width];

        for i in 1..=m {
            cells[i * width] = i as u32;
            for j in 1..=n {
                let cost = u32::from(pattern[i - 1] != text[j - 1]);
                let substitute = cells[(i - 1) * width + j - 1] + cost;
                let skip_pattern = cells[(i - 1) * width + j] + 1;
                let skip_text = cells[i * width + j - 1] + 1;
                cells[i * width + j] = substitute.min(skip_pattern).min(skip_text);
            }
        }

        Self { cells, rows: m + 1, width }
    }

    fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.width + j]
    }

    /// Walk back from `(m, end)`; returns the alignment start and the text
    /// positions where characters matched exactly.
    fn traceback(&self, pattern: &[char], text: &[char], end: usize) -> (usize, Vec<usize>) {
        let mut i = self.rows - 1;
        let mut j = end;
        let mut matched = Vec::new();

        while i > 0 {
            let here = self.get(i, j);
            if j > 0 {
                let same = pattern[i - 1] == text[j - 1];
                if here == self.get(i - 1, j - 1) + u32::from(!same) {
                    if same {
                        matched.push(j - 1);
                    }
                    i -= 1;
                    j -= 1;
                    continue;
                }
                if here == self.get(i, j - 1) + 1 {
                    j -= 1;
                    continue;
                }
            }
            i -= 1;
        }

        matched.reverse();
        (j, matched)
    }
}
