use std::sync::Arc;

use anyhow::{anyhow, Result};
use semindex_core::tools::{self, ReadFileOptions};
use semindex_store::{LocalDirStore, Reader};

use crate::output;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: Arc<LocalDirStore>,
    name: &str,
    path: &str,
    start_line: Option<u32>,
    end_line: Option<i64>,
    search_pattern: Option<String>,
    context_before: u32,
    context_after: u32,
    line_numbers: bool,
) -> Result<()> {
    let state = store.load(name).await?.ok_or_else(|| anyhow!("no index named {name:?}"))?;
    let mut source = semindex_sources::factory::build_source(&state.source)?;

    let opts = ReadFileOptions {
        start_line,
        end_line,
        search_pattern,
        context_lines_before: Some(context_before),
        context_lines_after: Some(context_after),
        include_line_numbers: line_numbers,
    };
    let out = tools::read_file(Some(source.as_mut()), path, opts).await?;

    if let Some(error) = &out.error {
        output::eprintln_line(error);
    }
    output::print(&out)?;
    Ok(())
}
