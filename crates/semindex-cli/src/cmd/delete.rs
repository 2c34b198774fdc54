use std::sync::Arc;

use anyhow::Result;
use semindex_store::{LocalDirStore, Writer};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
struct DeleteOut {
    name: String,
    deleted: bool,
}

pub async fn run(store: Arc<LocalDirStore>, name: &str) -> Result<()> {
    store.delete(name).await?;
    output::print(&DeleteOut { name: name.to_string(), deleted: true })?;
    Ok(())
}
