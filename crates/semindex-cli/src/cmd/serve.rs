use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use semindex_server::config::ServerConfig;
use semindex_server::rpc::ToolServer;
use semindex_server::{http, stdio};
use semindex_store::LocalDirStore;
use tracing::info;

const BIND_ADDR_ENV: &str = "SEMINDEX_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

pub async fn run(store: Arc<LocalDirStore>, transport: &str, search_only: bool) -> Result<()> {
    let config = ServerConfig::from_env(search_only).context("loading server configuration")?;
    let server = Arc::new(ToolServer { store, config });

    match transport {
        "stdio" => {
            stdio::serve(server).await;
            Ok(())
        }
        "http" => {
            let router = http::router(server);
            let addr = std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
            let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
            info!(addr, "semindex HTTP tool server listening");
            axum::serve(listener, router).await.context("serving HTTP")?;
            Ok(())
        }
        other => Err(anyhow!("unknown transport {other:?}; expected \"stdio\" or \"http\"")),
    }
}
