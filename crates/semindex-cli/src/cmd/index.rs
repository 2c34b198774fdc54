use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use semindex_core::engine::InMemoryEngineFactory;
use semindex_core::indexer::Indexer;
use semindex_core::model::{
    BitbucketConfig, GitHubConfig, GitLabConfig, LocalFsConfig, SourceMetadata, WebConfig,
};
use semindex_server::config::ServerConfig;
use semindex_store::{AsIndexStateStore, LocalDirStore, Reader};
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
struct IndexOut {
    name: String,
    result: semindex_core::model::IndexResult,
}

fn build_metadata(source_type: &str, config_json: &str) -> Result<SourceMetadata> {
    let value: serde_json::Value = serde_json::from_str(config_json).context("parsing --source-config as JSON")?;
    let synced_at = SourceMetadata::now_iso8601();
    Ok(match source_type {
        "localfs" => SourceMetadata::LocalFs { config: serde_json::from_value::<LocalFsConfig>(value)?, synced_at },
        "github" => SourceMetadata::GitHub { config: serde_json::from_value::<GitHubConfig>(value)?, resolved_ref: None, synced_at },
        "gitlab" => SourceMetadata::GitLab { config: serde_json::from_value::<GitLabConfig>(value)?, resolved_ref: None, synced_at },
        "bitbucket" => {
            SourceMetadata::Bitbucket { config: serde_json::from_value::<BitbucketConfig>(value)?, resolved_ref: None, synced_at }
        }
        "web" => SourceMetadata::Web { config: serde_json::from_value::<WebConfig>(value)?, synced_at },
        other => return Err(anyhow!("unknown source type {other:?}; expected localfs|github|gitlab|bitbucket|web")),
    })
}

pub async fn run(
    store: Arc<LocalDirStore>,
    name: &str,
    source_type: Option<&str>,
    source_config: Option<&str>,
) -> Result<()> {
    let metadata = match store.load(name).await? {
        Some(state) => state.source,
        None => {
            let source_type = source_type.ok_or_else(|| anyhow!("index {name:?} has no prior state; --source-type is required"))?;
            let source_config = source_config.unwrap_or("{}");
            build_metadata(source_type, source_config)?
        }
    };

    let mut source = semindex_sources::factory::build_source(&metadata)?;
    let config = ServerConfig::from_env(false)?;
    let indexer = Indexer::new(config.auth);
    let state_store = AsIndexStateStore(store.as_ref());
    let result = indexer.index(source.as_mut(), &state_store, &InMemoryEngineFactory, name).await?;

    output::print(&IndexOut { name: name.to_string(), result })?;
    Ok(())
}
