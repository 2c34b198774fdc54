//! Line-delimited JSON-RPC over stdio. One JSON-RPC request per line on
//! stdin; one response per line on stdout.

use std::sync::Arc;

use jsonrpc_core::IoHandler;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::rpc::{build_io_handler, ToolServer};

pub async fn serve(server: Arc<ToolServer>) {
    let handler: IoHandler = build_io_handler(server);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    info!("semindex stdio tool server ready");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "reading stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handler.handle_request(&line).await;
        if let Some(resp) = response {
            if stdout.write_all(resp.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            if stdout.flush().await.is_err() {
                break;
            }
        }
    }
}
