use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use semindex_store::LocalDirStore;

use crate::args::{Cli, Command};

mod delete;
mod doctor;
mod index;
mod indexes;
mod list;
mod read;
mod search;
mod serve;

/// Resolves the store root per the CLI-path > env-var > OS-default
/// precedence and opens a `LocalDirStore` against it.
fn open_store(cli: &Cli) -> Result<Arc<LocalDirStore>> {
    let root = match &cli.store_root {
        Some(path) => PathBuf::from(path),
        None => semindex_store::paths::default_store_root("semindex").context("resolving default store path")?,
    };
    Ok(Arc::new(LocalDirStore::new(root)))
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command.clone() {
        Command::Index { name, source_type, source_config } => {
            index::run(open_store(&cli)?, &name, source_type.as_deref(), source_config.as_deref()).await
        }
        Command::Search { name, query, max_chars } => search::run(open_store(&cli)?, &name, &query, max_chars).await,
        Command::List { name, directory, pattern, depth, show_hidden } => {
            list::run(open_store(&cli)?, &name, directory, pattern, depth, show_hidden).await
        }
        Command::Read {
            name,
            path,
            start_line,
            end_line,
            search_pattern,
            context_before,
            context_after,
            line_numbers,
        } => {
            read::run(
                open_store(&cli)?,
                &name,
                &path,
                start_line,
                end_line,
                search_pattern,
                context_before,
                context_after,
                line_numbers,
            )
            .await
        }
        Command::Indexes => indexes::run(open_store(&cli)?).await,
        Command::Delete { name } => delete::run(open_store(&cli)?, &name).await,
        Command::Doctor => doctor::run().await,
        Command::Serve { transport, search_only } => serve::run(open_store(&cli)?, &transport, search_only).await,
    }
}
