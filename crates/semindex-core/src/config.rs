//! Explicit configuration for the filter pipeline and the indexer.
//!
//! A plain data struct with conservative defaults, validated once by
//! the caller. No environment access happens here — that is
//! `semindex-cli`/`semindex-server`'s job.

use crate::errors::IndexError;

/// Limits governing the filter pipeline and the diff-storm heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Per-file byte size cap enforced by filter stage 2.
    pub max_file_bytes: u64,
    /// `fetchChanges` falls back to a full re-index once the changed-file
    /// count strictly exceeds this threshold.
    pub max_diff_entries: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: crate::filter::DEFAULT_SIZE_CAP_BYTES,
            max_diff_entries: 100,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_file_bytes == 0 {
            return Err(IndexError::config("max_file_bytes must be greater than zero"));
        }
        if self.max_diff_entries == 0 {
            return Err(IndexError::config("max_diff_entries must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CoreConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_file_bytes_rejected() {
        let cfg = CoreConfig { max_file_bytes: 0, ..CoreConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
