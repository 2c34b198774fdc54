use std::sync::Arc;

use anyhow::Result;
use semindex_store::{LocalDirStore, Reader};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
struct IndexesOut {
    names: Vec<String>,
}

pub async fn run(store: Arc<LocalDirStore>) -> Result<()> {
    let mut names = store.list().await?;
    names.sort();
    output::print(&IndexesOut { names })?;
    Ok(())
}
