//! The opaque "Context Engine" collaborator.
//!
//! The real embedding/retrieval service is out of scope for this
//! system; it is specified here only as a trait with a minimal API
//! surface, plus an in-memory reference implementation
//! used by tests and by the CLI's offline mode. Implementations MUST
//! satisfy `import(export(x)) == x`.

use async_trait::async_trait;

use crate::errors::IndexError;
use crate::model::FileEntry;

/// Credentials/endpoint needed to talk to a real context engine.
#[derive(Debug, Clone)]
pub struct EngineAuth {
    pub api_key: String,
    pub api_url: String,
}

/// The opaque semantic-search collaborator.
#[async_trait]
pub trait ContextEngine: Send + Sync {
    async fn add_to_index(&mut self, entries: &[FileEntry]) -> Result<(), IndexError>;
    async fn remove_from_index(&mut self, paths: &[String]) -> Result<(), IndexError>;
    async fn search(&mut self, query: &str, max_output_length: Option<u32>) -> Result<String, IndexError>;
    /// Exports the engine's internal state as an opaque JSON value. The
    /// core never introspects this value.
    fn export(&self) -> serde_json::Value;
}

/// Constructs a fresh, empty engine.
#[async_trait]
pub trait ContextEngineFactory: Send + Sync {
    type Engine: ContextEngine;

    async fn create(&self, auth: &EngineAuth) -> Result<Self::Engine, IndexError>;
    async fn import(&self, blob: serde_json::Value, auth: &EngineAuth) -> Result<Self::Engine, IndexError>;
}

/// A deterministic, in-process stand-in for the real context engine.
/// Stores entries in a sorted map keyed by path so `export`/`import`
/// round-trip byte-for-byte and `search` is reproducible in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextEngine {
    files: std::collections::BTreeMap<String, String>,
}

impl InMemoryContextEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_export(blob: serde_json::Value) -> Result<Self, IndexError> {
        let files: std::collections::BTreeMap<String, String> = serde_json::from_value(blob)
            .map_err(|e| IndexError::integrity(format!("invalid in-memory engine state: {e}")))?;
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl ContextEngine for InMemoryContextEngine {
    async fn add_to_index(&mut self, entries: &[FileEntry]) -> Result<(), IndexError> {
        for e in entries {
            self.files.insert(e.path.clone(), e.contents.clone());
        }
        Ok(())
    }

    async fn remove_from_index(&mut self, paths: &[String]) -> Result<(), IndexError> {
        for p in paths {
            self.files.remove(p);
        }
        Ok(())
    }

    async fn search(&mut self, query: &str, max_output_length: Option<u32>) -> Result<String, IndexError> {
        let mut hits: Vec<&str> = self
            .files
            .iter()
            .filter(|(_, contents)| contents.contains(query) || query.is_empty())
            .map(|(path, _)| path.as_str())
            .collect();
        hits.sort_unstable();

        let mut rendered = hits.join("\n");
        if let Some(max) = max_output_length {
            rendered.truncate(max as usize);
        }
        Ok(rendered)
    }

    fn export(&self) -> serde_json::Value {
        serde_json::to_value(&self.files).unwrap_or(serde_json::Value::Null)
    }
}

/// Builds `InMemoryContextEngine`s. The only concrete factory this
/// workspace ships; binaries wire it in directly since the real
/// embedding/retrieval service is an external collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryEngineFactory;

#[async_trait]
impl ContextEngineFactory for InMemoryEngineFactory {
    type Engine = InMemoryContextEngine;

    async fn create(&self, _auth: &EngineAuth) -> Result<Self::Engine, IndexError> {
        Ok(InMemoryContextEngine::new())
    }

    async fn import(&self, blob: serde_json::Value, _auth: &EngineAuth) -> Result<Self::Engine, IndexError> {
        InMemoryContextEngine::from_export(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn export_import_round_trips() {
        let mut engine = InMemoryContextEngine::new();
        engine.add_to_index(&[FileEntry::new("a.txt", "hello")]).await.unwrap();
        let blob = engine.export();
        let restored = InMemoryContextEngine::from_export(blob).unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[tokio::test]
    async fn search_matches_substring() {
        let mut engine = InMemoryContextEngine::new();
        engine.add_to_index(&[FileEntry::new("a.txt", "hello world")]).await.unwrap();
        let out = engine.search("world", None).await.unwrap();
        assert_eq!(out, "a.txt");
    }
}
