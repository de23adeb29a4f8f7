//! Exact-Match Response Cache
//!
//! An in-memory view over the query and response logs, rebuilt on every
//! invocation and discarded afterwards. Keys are normalized queries; lookup is
//! a single exact match on the normalized input. No fuzzy matching, no
//! ranking, no eviction.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::normalize;

/// What to do when the two logs parse to different lengths
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MisalignmentPolicy {
    /// Pair entries by index and ignore the tail of the longer log
    #[default]
    Truncate,
    /// Refuse to build the cache
    Reject,
}

impl fmt::Display for MisalignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncate => write!(f, "truncate"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for MisalignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "truncate" => Ok(Self::Truncate),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown misalignment policy '{other}' (expected 'truncate' or 'reject')"
            )),
        }
    }
}

/// Cache build errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The logs hold different numbers of blocks
    #[error("Query log has {queries} entries but response log has {responses}")]
    MisalignedLogs {
        /// Number of query blocks
        queries: usize,
        /// Number of response blocks
        responses: usize,
    },
}

/// Normalized query to raw response
#[derive(Clone, Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, String>,
}

impl ResponseCache {
    /// Build the cache from parallel query and response blocks
    ///
    /// Entry `i` of `queries` maps to entry `i` of `responses`. When a query
    /// repeats, the later response wins.
    ///
    /// # Errors
    ///
    /// With `MisalignmentPolicy::Reject`, unequal lengths are
    /// `CacheError::MisalignedLogs`. With `Truncate`, pairing stops at the
    /// shorter log.
    pub fn build(
        queries: &[String],
        responses: &[String],
        policy: MisalignmentPolicy,
    ) -> Result<Self, CacheError> {
        if queries.len() != responses.len() {
            match policy {
                MisalignmentPolicy::Reject => {
                    return Err(CacheError::MisalignedLogs {
                        queries: queries.len(),
                        responses: responses.len(),
                    });
                }
                MisalignmentPolicy::Truncate => {
                    tracing::warn!(
                        queries = queries.len(),
                        responses = responses.len(),
                        "Logs are misaligned, ignoring unpaired tail"
                    );
                }
            }
        }

        let entries = queries
            .iter()
            .zip(responses)
            .map(|(query, response)| (normalize(query), response.clone()))
            .collect();

        Ok(Self { entries })
    }

    /// Exact lookup of the normalized input
    #[must_use]
    pub fn lookup(&self, raw_input: &str) -> Option<&str> {
        self.entries.get(&normalize(raw_input)).map(String::as_str)
    }

    /// Number of distinct cached queries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
