//! Data model shared by the indexer, sources, store, and tools.
//!
//! Serialization uses
//! camelCase keys to match the canonical persisted state file format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::IndexError;

/// A relative, POSIX-style path with contents, ready to hand to the
/// context engine.
///
/// Invariant: `path` never contains a `..` segment; `contents` round-trips
/// through UTF-8 decode/encode identically (enforced by the filter
/// pipeline before a `FileEntry` is constructed from raw bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub contents: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self { path: path.into(), contents: contents.into() }
    }
}

/// File/directory type discriminator for listing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// A listing entry. Contents are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// The result of diffing a source between two syncs.
///
/// Invariant: `added`, `modified`, and `removed` are pairwise disjoint by
/// path. `removed` uses the *previous* path for renamed entries; `added`
/// uses the new path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<FileEntry>,
    pub modified: Vec<FileEntry>,
    pub removed: Vec<String>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn files_changed(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

/// Configuration for a LocalFS source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFsConfig {
    pub root_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<Vec<String>>,
}

/// Configuration shared by the GitHub-shaped adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

/// Configuration shared by the GitLab-shaped adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabConfig {
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

/// Configuration shared by the Bitbucket-shaped adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitbucketConfig {
    pub workspace: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
}

/// Configuration for the website crawler source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respect_robots: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// The discriminated union of source descriptors, persisted alongside
/// embeddings so a Source can be reconstructed without external
/// configuration.
///
/// Invariants: `synced_at` is monotone per (store, name); `resolved_ref`,
/// where present, is a full content-addressed commit id, never a branch
/// name. Secrets are never part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SourceMetadata {
    #[serde(rename = "localfs")]
    LocalFs { config: LocalFsConfig, synced_at: String },
    #[serde(rename = "github")]
    GitHub { config: GitHubConfig, #[serde(default)] resolved_ref: Option<String>, synced_at: String },
    #[serde(rename = "gitlab")]
    GitLab { config: GitLabConfig, #[serde(default)] resolved_ref: Option<String>, synced_at: String },
    #[serde(rename = "bitbucket")]
    Bitbucket { config: BitbucketConfig, #[serde(default)] resolved_ref: Option<String>, synced_at: String },
    #[serde(rename = "web")]
    Web { config: WebConfig, synced_at: String },
}

impl SourceMetadata {
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceMetadata::LocalFs { .. } => "localfs",
            SourceMetadata::GitHub { .. } => "github",
            SourceMetadata::GitLab { .. } => "gitlab",
            SourceMetadata::Bitbucket { .. } => "bitbucket",
            SourceMetadata::Web { .. } => "web",
        }
    }

    pub fn synced_at(&self) -> &str {
        match self {
            SourceMetadata::LocalFs { synced_at, .. }
            | SourceMetadata::GitHub { synced_at, .. }
            | SourceMetadata::GitLab { synced_at, .. }
            | SourceMetadata::Bitbucket { synced_at, .. }
            | SourceMetadata::Web { synced_at, .. } => synced_at,
        }
    }

    pub fn resolved_ref(&self) -> Option<&str> {
        match self {
            SourceMetadata::GitHub { resolved_ref, .. }
            | SourceMetadata::GitLab { resolved_ref, .. }
            | SourceMetadata::Bitbucket { resolved_ref, .. } => resolved_ref.as_deref(),
            SourceMetadata::LocalFs { .. } | SourceMetadata::Web { .. } => None,
        }
    }

    /// Returns the current UTC time as an ISO-8601 string, the format
    /// every adapter uses for `synced_at`.
    pub fn now_iso8601() -> String {
        time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Iso8601::DEFAULT)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }

    /// Backward-compatibility migration: a legacy
    /// `{type, identifier, ref}` document (no `config` field) is
    /// reconstructed into the current shape. Re-encoded on next save.
    pub fn from_legacy_value(mut value: serde_json::Value) -> Result<Self, IndexError> {
        let obj = value.as_object_mut().ok_or_else(|| {
            IndexError::integrity("legacy source metadata is not a JSON object")
        })?;

        if obj.contains_key("config") {
            return serde_json::from_value(value)
                .map_err(|e| IndexError::integrity(format!("invalid source metadata: {e}")));
        }

        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::integrity("legacy source metadata missing type"))?
            .to_string();
        let identifier = obj
            .get("identifier")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::integrity("legacy source metadata missing identifier"))?
            .to_string();
        let r#ref = obj.get("ref").and_then(|v| v.as_str()).map(|s| s.to_string());
        let synced_at = obj
            .get("syncedAt")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(Self::now_iso8601);

        match ty.as_str() {
            "localfs" => Ok(SourceMetadata::LocalFs {
                config: LocalFsConfig { root_path: identifier, ignore_patterns: None },
                synced_at,
            }),
            "github" => {
                let mut parts = identifier.splitn(2, '/');
                let owner = parts.next().unwrap_or_default().to_string();
                let repo = parts.next().unwrap_or_default().to_string();
                Ok(SourceMetadata::GitHub {
                    config: GitHubConfig { owner, repo, r#ref },
                    resolved_ref: None,
                    synced_at,
                })
            }
            "gitlab" => Ok(SourceMetadata::GitLab {
                config: GitLabConfig { project_id: identifier, base_url: None, r#ref },
                resolved_ref: None,
                synced_at,
            }),
            "bitbucket" => {
                let mut parts = identifier.splitn(2, '/');
                let workspace = parts.next().unwrap_or_default().to_string();
                let repo = parts.next().unwrap_or_default().to_string();
                Ok(SourceMetadata::Bitbucket {
                    config: BitbucketConfig { workspace, repo, base_url: None, r#ref },
                    resolved_ref: None,
                    synced_at,
                })
            }
            "web" => {
                let url = if identifier.starts_with("http://") || identifier.starts_with("https://") {
                    identifier
                } else {
                    format!("https://{identifier}")
                };
                Ok(SourceMetadata::Web {
                    config: WebConfig {
                        url,
                        max_depth: None,
                        max_pages: None,
                        include_paths: None,
                        exclude_paths: None,
                        respect_robots: None,
                        user_agent: None,
                        delay_ms: None,
                    },
                    synced_at,
                })
            }
            other => Err(IndexError::config(format!("unknown legacy source type: {other}"))),
        }
    }
}

/// Opaque context-engine state plus the source descriptor, treated as an
/// atomic unit by the Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexState {
    pub context_state: serde_json::Value,
    pub source: SourceMetadata,
}

impl IndexState {
    /// Parses a persisted state document, applying the legacy-metadata
    /// migration when `source` lacks a `config` field.
    pub fn from_json(value: serde_json::Value) -> Result<Self, IndexError> {
        let mut obj = value
            .as_object()
            .cloned()
            .ok_or_else(|| IndexError::integrity("index state is not a JSON object"))?;

        let context_state = obj
            .remove("contextState")
            .ok_or_else(|| IndexError::integrity("index state missing contextState"))?;
        let source_value = obj
            .remove("source")
            .ok_or_else(|| IndexError::integrity("index state missing source"))?;

        let source = SourceMetadata::from_legacy_value(source_value)?;

        Ok(IndexState { context_state, source })
    }

    pub fn to_json(&self) -> Result<serde_json::Value, IndexError> {
        serde_json::to_value(self).map_err(|e| IndexError::integrity(format!("failed to serialize index state: {e}")))
    }
}

/// The outcome of a single `Indexer::index` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexResultType {
    Full,
    Incremental,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResult {
    #[serde(rename = "type")]
    pub kind: IndexResultType,
    pub files_indexed: u64,
    pub files_removed: u64,
    pub duration_ms: u64,
}

/// Named reasons a file was rejected by the filter pipeline, suitable
/// for aggregation in a single pass over a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    PathTraversal,
    Size,
    AugmentIgnore,
    Keyish,
    Binary,
    GitIgnore,
}

impl RejectReason {
    pub fn tag(&self) -> &'static str {
        match self {
            RejectReason::PathTraversal => "path_traversal",
            RejectReason::Size => "size",
            RejectReason::AugmentIgnore => "augmentignore",
            RejectReason::Keyish => "keyish",
            RejectReason::Binary => "binary",
            RejectReason::GitIgnore => "gitignore",
        }
    }
}

/// Aggregated outcome of scanning a whole tree through the filter
/// pipeline in one pass.
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub admitted: Vec<FileEntry>,
    pub rejected: BTreeMap<RejectReason, Vec<String>>,
}

impl FilterReport {
    pub fn record_rejected(&mut self, reason: RejectReason, path: String) {
        self.rejected.entry(reason).or_default().push(path);
    }
}
