use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::routing::post;
use semindex_server::config::ServerConfig;
use semindex_server::rpc::ToolServer;
use semindex_server::webhook::{default_index_name, WebhookServer};
use semindex_server::{http, stdio, webhook};
use semindex_store::LocalDirStore;
use tracing::info;

const BIND_ADDR_ENV: &str = "SEMINDEX_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "http".to_string());
    let search_only = std::env::args().any(|a| a == "--search-only");

    let config = ServerConfig::from_env(search_only).context("loading server configuration")?;
    let store_root = semindex_store::paths::default_store_root("semindex")?;
    let store = Arc::new(LocalDirStore::new(store_root));

    match mode.as_str() {
        "stdio" => {
            let server = Arc::new(ToolServer { store, config });
            stdio::serve(server).await;
            Ok(())
        }
        "http" => {
            let webhook_secret = config.webhook_secret.clone();
            let auth = config.auth.clone();
            let tool_server = Arc::new(ToolServer { store: store.clone(), config });

            let mut router = http::router(tool_server);
            if let Some(secret) = webhook_secret {
                let webhook_server = Arc::new(WebhookServer {
                    store,
                    auth,
                    secret,
                    delete_on_branch_deletion: true,
                    name_fn: default_index_name,
                });
                router = router.route(
                    "/webhook",
                    post(webhook::handle_webhook).with_state(webhook_server),
                );
            }

            let addr = std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
            let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
            info!(addr, "semindex HTTP tool server listening");
            axum::serve(listener, router).await.context("serving HTTP")?;
            Ok(())
        }
        other => Err(anyhow!("unknown server mode {other:?}; expected \"stdio\" or \"http\"")),
    }
}
