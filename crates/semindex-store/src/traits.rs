//! The Reader/Writer split: consumers that only
//! need to look up state (the search-only CLI path, a read-only API
//! deployment) depend on `Reader`; the indexer depends on the wider
//! `Writer`.

use async_trait::async_trait;
use semindex_core::errors::IndexError;
use semindex_core::indexer::IndexStateStore;
use semindex_core::model::IndexState;

/// Read-only access to persisted index state.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Returns `None` when `name` has no persisted state; any other
    /// failure (unparseable state, transport error) is an `Err`.
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError>;

    /// Enumerates known names by storage prefix; order is unspecified.
    async fn list(&self) -> Result<Vec<String>, IndexError>;

    /// Slimmed load for search-only consumers. Default falls back to
    /// `load` in full; implementations may override to skip fields a
    /// search-only caller never reads.
    async fn load_search(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        self.load(name).await
    }
}

/// Full read/write access. `save` is atomic at the granularity of a
/// single `IndexState`.
#[async_trait]
pub trait Writer: Reader {
    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError>;
    async fn delete(&self, name: &str) -> Result<(), IndexError>;
}

/// Adapts any `&dyn Writer` to the narrower `IndexStateStore` the
/// indexer depends on, without requiring trait-object upcasting.
pub struct AsIndexStateStore<'a>(pub &'a dyn Writer);

#[async_trait]
impl IndexStateStore for AsIndexStateStore<'_> {
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        self.0.load(name).await
    }

    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError> {
        self.0.save(name, state).await
    }
}
