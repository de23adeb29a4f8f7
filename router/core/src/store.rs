//! Block Log Storage
//!
//! The query and response logs are plain text files holding a sequence of
//! blocks. Blocks are separated by a line containing only the delimiter token
//! (a backtick by default):
//!
//! ```text
//! capital of france
//! `
//! how do transformers
//! use attention?
//! `
//! ```
//!
//! Block `i` of the query log is answered by block `i` of the response log.
//! Both logs are append-only and must be read and written through the same
//! rules so the two sequences stay positionally aligned.
//!
//! There is no locking: concurrent writers from several processes can
//! interleave appends.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Default block delimiter
pub const DEFAULT_DELIMITER: &str = "`";

/// Errors raised by the block logs
#[derive(Debug, Error)]
pub enum StoreError {
    /// The log file does not exist
    #[error("Log file not found at {path} (run with --init to create it)")]
    Missing {
        /// The path that was attempted
        path: PathBuf,
    },

    /// The log file exists but could not be read
    #[error("Failed to read log file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Appending to the log file failed
    #[error("Failed to append to log file at {path}: {source}")]
    Write {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// The block text contains a delimiter line and would split on re-read
    #[error("Block text contains a delimiter line ({delimiter:?})")]
    DelimiterCollision {
        /// The configured delimiter
        delimiter: String,
    },

    /// The block text is empty once canonicalized and would not be re-read
    #[error("Block text is empty")]
    EmptyBlock,
}

/// Split log content into blocks.
///
/// Lines are trimmed; a line equal to `delimiter` closes the current block.
/// A block is emitted only when non-empty, so consecutive delimiters produce
/// nothing. Content after the last delimiter is still emitted.
#[must_use]
pub fn parse_blocks(content: &str, delimiter: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line == delimiter {
            flush_block(&mut current, &mut blocks);
        } else {
            current.push(line);
        }
    }
    flush_block(&mut current, &mut blocks);

    blocks
}

fn flush_block(current: &mut Vec<&str>, blocks: &mut Vec<String>) {
    let joined = current.join("\n");
    current.clear();

    let block = joined.trim();
    if !block.is_empty() {
        blocks.push(block.to_string());
    }
}

/// The form a block takes after a write and re-read.
///
/// Every line is trimmed and leading/trailing blank lines are dropped.
#[must_use]
pub fn canonical_block(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Render a block the way it is appended to a log
#[must_use]
pub fn format_block(text: &str, delimiter: &str) -> String {
    format!("\n{text}\n{delimiter}")
}

/// Check that `text` survives an append and re-read as exactly one block
///
/// # Errors
///
/// Returns `StoreError::EmptyBlock` or `StoreError::DelimiterCollision`.
pub fn validate_block(text: &str, delimiter: &str) -> Result<(), StoreError> {
    if text.trim().is_empty() {
        return Err(StoreError::EmptyBlock);
    }
    if text.lines().any(|line| line.trim() == delimiter) {
        return Err(StoreError::DelimiterCollision {
            delimiter: delimiter.to_string(),
        });
    }
    Ok(())
}

/// A single delimiter-separated append-only log file
#[derive(Clone, Debug)]
pub struct BlockStore {
    path: PathBuf,
    delimiter: String,
}

impl BlockStore {
    /// Create a store for the log at `path`
    pub fn new(path: impl Into<PathBuf>, delimiter: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            delimiter: delimiter.into(),
        }
    }

    /// Path of the underlying log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block delimiter
    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Read every block in the log
    ///
    /// # Errors
    ///
    /// A missing file is `StoreError::Missing`, never an empty log.
    pub async fn read_blocks(&self) -> Result<Vec<String>, StoreError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::Missing {
                    path: self.path.clone(),
                },
                _ => StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                },
            })?;

        let blocks = parse_blocks(&content, &self.delimiter);
        tracing::debug!(path = %self.path.display(), blocks = blocks.len(), "Read log");
        Ok(blocks)
    }

    /// Append one block to the log
    ///
    /// Writes a newline, the text, a newline and the delimiter line. The file
    /// is opened in append mode and closed before returning.
    ///
    /// # Errors
    ///
    /// Fails if the text would not re-read as one block, or on IO errors.
    pub async fn append_block(&self, text: &str) -> Result<(), StoreError> {
        validate_block(text, &self.delimiter)?;

        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::Missing {
                    path: self.path.clone(),
                },
                _ => write_err(e),
            })?;

        file.write_all(format_block(text, &self.delimiter).as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(())
    }

    /// Create an empty log if none exists. Returns `true` if a file was created.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Write` if the file or its directory cannot be created.
    pub async fn create_if_missing(&self) -> Result<bool, StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if tokio::fs::try_exists(&self.path).await.map_err(write_err)? {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;

        tracing::info!(path = %self.path.display(), "Created empty log");
        Ok(true)
    }
}

/// The query log and response log, kept in step
#[derive(Clone, Debug)]
pub struct LogPair {
    /// Query log
    pub queries: BlockStore,
    /// Response log
    pub responses: BlockStore,
}

impl LogPair {
    /// Create a pair sharing one delimiter
    pub fn new(
        query_path: impl Into<PathBuf>,
        response_path: impl Into<PathBuf>,
        delimiter: &str,
    ) -> Self {
        Self {
            queries: BlockStore::new(query_path, delimiter),
            responses: BlockStore::new(response_path, delimiter),
        }
    }

    /// Read both logs
    ///
    /// # Errors
    ///
    /// Fails if either log is missing or unreadable.
    pub async fn load(&self) -> Result<(Vec<String>, Vec<String>), StoreError> {
        let queries = self.queries.read_blocks().await?;
        let responses = self.responses.read_blocks().await?;
        Ok((queries, responses))
    }

    /// Append a query and its response at the same index
    ///
    /// Both blocks are validated before either file is touched.
    ///
    /// # Errors
    ///
    /// Fails on validation or IO errors. If the response append fails after
    /// the query append succeeded, the logs are left one entry apart.
    pub async fn append_pair(&self, query: &str, response: &str) -> Result<(), StoreError> {
        validate_block(query, self.queries.delimiter())?;
        validate_block(response, self.responses.delimiter())?;

        self.queries.append_block(query).await?;
        if let Err(e) = self.responses.append_block(response).await {
            tracing::error!(
                error = %e,
                query_log = %self.queries.path().display(),
                "Response append failed after query append; logs are misaligned"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Create both logs if they do not exist
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Write` if either file cannot be created.
    pub async fn create_if_missing(&self) -> Result<(), StoreError> {
        self.queries.create_if_missing().await?;
        self.responses.create_if_missing().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_basic_blocks() {
        let content = "capital of france\n`\nhow do\ntransformers work\n`\n";
        assert_eq!(
            parse_blocks(content, "`"),
            vec!["capital of france", "how do\ntransformers work"]
        );
    }

    #[test]
    fn test_parse_trims_lines_and_skips_empty_blocks() {
        let content = "`\n`\n   first  \n\t`\n\n\n`\n  second\n";
        assert_eq!(parse_blocks(content, "`"), vec!["first", "second"]);
    }

    #[test]
    fn test_parse_keeps_dangling_block() {
        assert_eq!(parse_blocks("a\n`\nb", "`"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_keeps_inner_blank_lines() {
        assert_eq!(parse_blocks("\npara one\n\npara two\n`", "`"), vec!["para one\n\npara two"]);
    }

    #[test]
    fn test_parse_delimiter_only_matches_whole_line() {
        let content = "uses `code` inline\n`";
        assert_eq!(parse_blocks(content, "`"), vec!["uses `code` inline"]);
    }

    #[test]
    fn test_parse_crlf() {
        assert_eq!(parse_blocks("one\r\n`\r\ntwo\r\n`\r\n", "`"), vec!["one", "two"]);
    }

    #[test]
    fn test_parse_custom_delimiter() {
        assert_eq!(parse_blocks("a\n---\nb\n---", "---"), vec!["a", "b"]);
    }

    #[test]
    fn test_format_then_parse() {
        for text in ["Paris", "line one\nline two", "with `ticks` inside"] {
            let rendered = format_block(text, "`");
            assert_eq!(parse_blocks(&rendered, "`"), vec![text.to_string()]);
        }
    }

    #[test]
    fn test_canonical_block() {
        assert_eq!(canonical_block("\n  Hello  \n\n  world \n\n"), "Hello\n\nworld");
        assert_eq!(canonical_block("Paris"), "Paris");
    }

    #[test]
    fn test_validate_block() {
        assert!(validate_block("fine", "`").is_ok());
        assert!(matches!(validate_block("  \n ", "`"), Err(StoreError::EmptyBlock)));
        assert!(matches!(
            validate_block("before\n  `  \nafter", "`"),
            Err(StoreError::DelimiterCollision { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path().join("nope.txt"), "`");
        assert!(matches!(
            store.read_blocks().await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_append_to_empty_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path().join("queries.txt"), "`");
        assert!(store.create_if_missing().await.unwrap());
        assert!(!store.create_if_missing().await.unwrap());

        store.append_block("what is rust?").await.unwrap();
        assert_eq!(store.read_blocks().await.unwrap(), vec!["what is rust?"]);

        store.append_block("second\nquery").await.unwrap();
        assert_eq!(
            store.read_blocks().await.unwrap(),
            vec!["what is rust?", "second\nquery"]
        );
    }

    #[tokio::test]
    async fn test_append_preserves_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.txt");
        tokio::fs::write(&path, "Paris\n`").await.unwrap();

        let store = BlockStore::new(&path, "`");
        store.append_block("Berlin").await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, "Paris\n`\nBerlin\n`");
    }

    #[tokio::test]
    async fn test_append_rejects_collision_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let pair = LogPair::new(dir.path().join("q.txt"), dir.path().join("r.txt"), "`");
        pair.create_if_missing().await.unwrap();

        let result = pair.append_pair("query", "answer\n`\nmore").await;
        assert!(matches!(result, Err(StoreError::DelimiterCollision { .. })));

        let (queries, responses) = pair.load().await.unwrap();
        assert!(queries.is_empty());
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_append_to_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path().join("absent.txt"), "`");
        assert!(matches!(
            store.append_block("x").await,
            Err(StoreError::Missing { .. })
        ));
    }
}
