//! Triage Output Parsing
//!
//! The triage model answers in one of two shapes:
//! - `0` followed by a direct answer, for queries that need no research
//! - a comma-separated list of key terms, with no leading digit
//!
//! The marker is model-generated, so anything outside those two shapes is
//! rejected rather than guessed at.

/// Leading marker for a direct answer
pub const SENTINEL: char = '0';

/// Parsed triage decision
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Triage {
    /// Short answer, returned as-is and never cached
    Direct(String),
    /// Key terms to carry into compression
    Keywords(String),
}

/// Classify triage output
///
/// Leading whitespace is ignored. For a direct answer every leading `0` and
/// the whitespace around the answer are stripped.
///
/// # Errors
///
/// Returns a description of the problem for empty output, an empty direct
/// answer, or output starting with a digit other than the sentinel.
pub fn parse_triage(output: &str) -> Result<Triage, String> {
    let text = output.trim_start();

    if text.is_empty() {
        return Err("empty triage output".to_string());
    }

    if text.starts_with(SENTINEL) {
        let answer = text.trim_start_matches(SENTINEL).trim();
        if answer.is_empty() {
            return Err("sentinel with no answer".to_string());
        }
        return Ok(Triage::Direct(answer.to_string()));
    }

    if let Some(first) = text.chars().next().filter(char::is_ascii_digit) {
        return Err(format!("unexpected leading digit '{first}'"));
    }

    let keywords = text.trim_end();
    if keywords.split(',').all(|item| item.trim().is_empty()) {
        return Err("keyword list has no items".to_string());
    }

    Ok(Triage::Keywords(keywords.to_string()))
}
