use std::sync::Arc;

use anyhow::Result;
use semindex_core::engine::{ContextEngineFactory, InMemoryEngineFactory};
use semindex_core::tools::{self, SearchOptions};
use semindex_server::config::ServerConfig;
use semindex_store::{LocalDirStore, Reader};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
struct SearchOut {
    query: String,
    results: String,
}

pub async fn run(store: Arc<LocalDirStore>, name: &str, query: &str, max_chars: Option<u32>) -> Result<()> {
    let config = ServerConfig::from_env(true)?;
    let state = store
        .load_search(name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no index named {name:?}"))?;

    let mut engine = InMemoryEngineFactory.import(state.context_state, &config.auth).await?;
    let out = tools::search(&mut engine, query, SearchOptions { max_output_length: max_chars }).await?;
    output::print(&SearchOut { query: out.query, results: out.results })?;
    Ok(())
}
