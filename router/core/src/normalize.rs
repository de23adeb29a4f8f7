//! Query Normalization
//!
//! Canonical form used for cache keys and cache lookups. Two queries are the
//! same query when their normalized forms are byte-equal.

/// Canonicalize text for comparison.
///
/// Drops carriage returns, collapses every run of whitespace into a single
/// space, trims both ends and lower-cases the result. Total and idempotent.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.replace('\r', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
