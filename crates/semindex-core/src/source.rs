//! The `Source` contract. Concrete adapters
//! (LocalFS, GitHub, GitLab, Bitbucket, Website) live in
//! `semindex-sources` and implement this trait; it is declared here so
//! both the indexer and the adapters share one definition.

use async_trait::async_trait;

use crate::errors::IndexError;
use crate::model::{FileChanges, FileEntry, FileInfo, SourceMetadata};

/// Options accepted by `Source::read_file`.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub start_line: Option<u32>,
    pub end_line: Option<i64>,
    pub search_pattern: Option<String>,
}

/// A content origin behind a uniform five-operation contract. A Source
/// instance is single-owner and not required to be safe for concurrent
/// use by different consumers.
#[async_trait]
pub trait Source: Send + Sync {
    /// Produces a filtered, complete snapshot of the current resolved
    /// version. Implementations should avoid buffering an entire
    /// archive where the underlying transport allows streaming.
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError>;

    /// Returns changes from `previous` to the current resolved version,
    /// or `None` to signal "fall back to full" (unsupported, unknown
    /// previous ref, force-push analog, ignore-file change, or diff
    /// storm — semantics vary per adapter).
    async fn fetch_changes(&mut self, previous: &SourceMetadata) -> Result<Option<FileChanges>, IndexError>;

    /// Returns the current descriptor, including the resolved ref where
    /// applicable and `synced_at = now-UTC-ISO-8601`.
    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError>;

    /// Non-recursive listing of the current resolved version.
    async fn list_files(&mut self, directory: Option<&str>) -> Result<Vec<FileInfo>, IndexError>;

    /// Reads a single file relative to the source root. Returns `None`
    /// for missing/unreadable paths; path traversal is rejected as an
    /// error, not a `None`.
    async fn read_file(&mut self, path: &str, opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError>;
}

/// Rejects a path before it is handed to a transport, per the
/// path-traversal invariant shared by every `Source::read_file` impl.
pub fn reject_traversal(path: &str) -> Result<(), IndexError> {
    if path.split('/').any(|seg| seg == "..") {
        return Err(IndexError::config(format!("path contains '..' segment: {path}")));
    }
    Ok(())
}
