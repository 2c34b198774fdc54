use std::sync::Arc;

use anyhow::{anyhow, Result};
use semindex_core::tools::{self, ListFilesOptions};
use semindex_store::{LocalDirStore, Reader};

use crate::output;

pub async fn run(
    store: Arc<LocalDirStore>,
    name: &str,
    directory: Option<String>,
    pattern: Option<String>,
    depth: Option<u32>,
    show_hidden: bool,
) -> Result<()> {
    let state = store.load(name).await?.ok_or_else(|| anyhow!("no index named {name:?}"))?;
    let mut source = semindex_sources::factory::build_source(&state.source)?;

    let files = tools::list_files(Some(source.as_mut()), ListFilesOptions { directory, pattern, depth, show_hidden }).await?;
    output::print(&files)?;
    Ok(())
}
