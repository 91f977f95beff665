//! # Diagnostic Utilities
//!
//! Helpers for presenting grammar diagnostics:
//! - "did you mean" suggestions for misspelled symbols and guards
//! - source excerpts with a caret under the reported position

use crate::error::{GrammarError, SourcePos};
use std::fmt::Write;

/// The candidate closest to `actual`, if any is similar enough.
///
/// ```rust
/// use trellis::error::diagnostics::did_you_mean;
///
/// let suggestion = did_you_mean("PLSU", ["NUM", "PLUS", "TIMES"]);
/// assert_eq!(suggestion.as_deref(), Some("PLUS"));
/// ```
pub fn did_you_mean<'a>(
    actual: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let actual = actual.to_lowercase();
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = similarity(&actual, &candidate.to_lowercase());
        if score >= 0.5 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate.to_string())
}

/// The source line containing `pos` with a caret under its column.
#[must_use]
pub fn excerpt(source: &str, pos: SourcePos) -> Option<String> {
    let line = source.lines().nth(pos.line.checked_sub(1)? as usize)?;
    let column = (pos.column.max(1) - 1) as usize;
    let indent: String = line
        .chars()
        .take(column)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    Some(format!("{line}\n{indent}^"))
}

/// A diagnostic followed by the excerpt it points at, when it has a position.
#[must_use]
pub fn render(error: &GrammarError, source: &str) -> String {
    let mut out = error.to_string();
    if let Some(snippet) = error.position().and_then(|pos| excerpt(source, pos)) {
        let _ = write!(out, "\n{snippet}");
    }
    out
}

/// 1.0 for identical strings down to 0.0 for nothing in common
#[allow(clippy::cast_precision_loss)]
fn similarity(left: &str, right: &str) -> f64 {
    if left == right {
        return 1.0;
    }
    let longest = left.chars().count().max(right.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein(left, right) as f64 / longest as f64
}

fn levenshtein(left: &str, right: &str) -> usize {
    let right: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];
    for (i, l) in left.chars().enumerate() {
        current[0] = i + 1;
        for (j, r) in right.iter().enumerate() {
            let cost = usize::from(l != *r);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[right.len()]
}
