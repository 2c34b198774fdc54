//! Loads a named index into a ready-to-use `(ContextEngine, Source)`
//! pair for the tool handlers. In search-only mode no `Source` is
//! reconstructed and Source-requiring tools are denied.

use semindex_core::engine::{ContextEngineFactory, EngineAuth, InMemoryContextEngine, InMemoryEngineFactory};
use semindex_core::errors::IndexError;
use semindex_core::source::Source;
use semindex_store::Reader;

pub struct Session {
    pub engine: InMemoryContextEngine,
    pub source: Option<Box<dyn Source>>,
}

pub async fn load_session(
    store: &dyn Reader,
    name: &str,
    auth: &EngineAuth,
    search_only: bool,
) -> Result<Session, IndexError> {
    let state = if search_only { store.load_search(name).await? } else { store.load(name).await? };
    let state = state.ok_or_else(|| IndexError::not_found(format!("no index named {name:?}")))?;

    let factory = InMemoryEngineFactory;
    let engine = factory.import(state.context_state.clone(), auth).await?;

    let source = if search_only { None } else { Some(semindex_sources::factory::build_source(&state.source)?) };

    Ok(Session { engine, source })
}
