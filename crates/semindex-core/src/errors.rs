//! Error kinds shared by every semindex crate.
//!
//! Each variant is a named kind, not a grab-bag of wrapped failures.
//! Library code returns `IndexError` directly; binaries wrap it with
//! `anyhow::Context` for user-facing messages and map it to an exit
//! code (`exit_code`).

use thiserror::Error;

/// The error kinds produced by the core, source, and store contracts.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Missing credentials, unknown store/source type, bad CLI combination.
    #[error("configuration error: {0}")]
    Config(String),

    /// Named index absent, or requested file absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network/IO failure against a Source or a Store.
    #[error("transport error: {0}")]
    Transport(String),

    /// State file unparseable or missing required fields. Never auto-repaired.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Source bound to a client disagrees with stored SourceMetadata's type.
    #[error("source mismatch: {0}")]
    SourceMismatch(String),

    /// A tool requiring a bound Source was invoked in search-only mode.
    #[error("search-only mode: {0} requires a bound source")]
    SearchOnlyDenied(String),

    /// Propagated from upstream with rate-limit context.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Propagated from upstream with authorization context.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl IndexError {
    /// Maps an error kind to the process exit code convention:
    /// 2 = usage, 1 = runtime, 0 = success (never returned from here).
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexError::Config(_) => 2,
            IndexError::NotFound(_)
            | IndexError::Transport(_)
            | IndexError::Integrity(_)
            | IndexError::SourceMismatch(_)
            | IndexError::SearchOnlyDenied(_)
            | IndexError::RateLimited(_)
            | IndexError::Forbidden(_) => 1,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        IndexError::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        IndexError::NotFound(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        IndexError::Transport(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        IndexError::Integrity(msg.into())
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
