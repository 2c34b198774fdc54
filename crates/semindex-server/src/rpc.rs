//! JSON-RPC `tools/list` and `tools/call` methods, shared by the
//! stdio and HTTP transports. In search-only mode only
//! `search` is advertised and servable.

use std::sync::Arc;

use jsonrpc_core::{Error as RpcError, ErrorCode, IoHandler, Params, Value};
use semindex_core::tools::{self, ListFilesOptions, ReadFileOptions, SearchOptions};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::ServerConfig;
use crate::session::load_session;

pub struct ToolServer {
    pub store: Arc<dyn semindex_store::Reader>,
    pub config: ServerConfig,
}

fn tool_descriptors(search_only: bool) -> Value {
    let mut tools = vec![json!({
        "name": "search",
        "description": "Semantic search over a named index.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "index_name": {"type": "string"},
                "query": {"type": "string"},
                "maxChars": {"type": "integer"}
            },
            "required": ["index_name", "query"]
        }
    })];

    if !search_only {
        tools.push(json!({
            "name": "list_files",
            "description": "List files under a directory in a named index's bound Source.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "index_name": {"type": "string"},
                    "directory": {"type": "string"},
                    "pattern": {"type": "string"},
                    "depth": {"type": "integer"},
                    "showHidden": {"type": "boolean"}
                },
                "required": ["index_name"]
            }
        }));
        tools.push(json!({
            "name": "read_file",
            "description": "Read a file (optionally a line range or pattern match) from a named index's bound Source.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "index_name": {"type": "string"},
                    "path": {"type": "string"},
                    "startLine": {"type": "integer"},
                    "endLine": {"type": "integer"},
                    "searchPattern": {"type": "string"},
                    "contextLinesBefore": {"type": "integer"},
                    "contextLinesAfter": {"type": "integer"},
                    "includeLineNumbers": {"type": "boolean"}
                },
                "required": ["index_name", "path"]
            }
        }));
    }

    json!({ "tools": tools })
}

#[derive(Deserialize)]
struct ToolCall {
    name: String,
    arguments: Value,
}

#[derive(Deserialize)]
struct SearchArgs {
    index_name: String,
    query: String,
    #[serde(rename = "maxChars")]
    max_chars: Option<u32>,
}

#[derive(Deserialize, Default)]
struct ListFilesArgs {
    index_name: String,
    directory: Option<String>,
    pattern: Option<String>,
    depth: Option<u32>,
    #[serde(rename = "showHidden")]
    show_hidden: Option<bool>,
}

#[derive(Deserialize)]
struct ReadFileArgs {
    index_name: String,
    path: String,
    #[serde(rename = "startLine")]
    start_line: Option<u32>,
    #[serde(rename = "endLine")]
    end_line: Option<i64>,
    #[serde(rename = "searchPattern")]
    search_pattern: Option<String>,
    #[serde(rename = "contextLinesBefore")]
    context_lines_before: Option<u32>,
    #[serde(rename = "contextLinesAfter")]
    context_lines_after: Option<u32>,
    #[serde(rename = "includeLineNumbers")]
    include_line_numbers: Option<bool>,
}

fn to_rpc_error(e: semindex_core::errors::IndexError) -> RpcError {
    RpcError { code: ErrorCode::ServerError(1), message: e.to_string(), data: None }
}

fn invalid_params(e: impl std::fmt::Display) -> RpcError {
    RpcError { code: ErrorCode::InvalidParams, message: e.to_string(), data: None }
}

pub fn build_io_handler(server: Arc<ToolServer>) -> IoHandler {
    let mut io = IoHandler::new();

    {
        let server = server.clone();
        io.add_method("tools/list", move |_params: Params| {
            let search_only = server.config.search_only;
            async move { Ok(tool_descriptors(search_only)) }
        });
    }

    {
        let server = server.clone();
        io.add_method("tools/call", move |params: Params| {
            let server = server.clone();
            async move {
                let call: ToolCall = params.parse().map_err(invalid_params)?;
                match call.name.as_str() {
                    "search" => handle_search(&server, call.arguments).await,
                    "list_files" if !server.config.search_only => handle_list_files(&server, call.arguments).await,
                    "read_file" if !server.config.search_only => handle_read_file(&server, call.arguments).await,
                    other => {
                        warn!(tool = other, "unknown or unavailable tool requested");
                        Err(RpcError { code: ErrorCode::MethodNotFound, message: format!("unknown tool {other:?}"), data: None })
                    }
                }
            }
        });
    }

    io
}

async fn handle_search(server: &ToolServer, arguments: Value) -> jsonrpc_core::Result<Value> {
    let args: SearchArgs = serde_json::from_value(arguments).map_err(invalid_params)?;
    let mut session = load_session(server.store.as_ref(), &args.index_name, &server.config.auth, true)
        .await
        .map_err(to_rpc_error)?;
    let out = tools::search(&mut session.engine, &args.query, SearchOptions { max_output_length: args.max_chars })
        .await
        .map_err(to_rpc_error)?;
    Ok(json!({ "results": out.results, "query": out.query }))
}

async fn handle_list_files(server: &ToolServer, arguments: Value) -> jsonrpc_core::Result<Value> {
    let args: ListFilesArgs = serde_json::from_value(arguments).map_err(invalid_params)?;
    let mut session = load_session(server.store.as_ref(), &args.index_name, &server.config.auth, false)
        .await
        .map_err(to_rpc_error)?;
    let opts = ListFilesOptions {
        directory: args.directory,
        pattern: args.pattern,
        depth: args.depth,
        show_hidden: args.show_hidden.unwrap_or(false),
    };
    let source: Option<&mut dyn semindex_core::source::Source> = match session.source.as_mut() {
        Some(b) => Some(&mut **b),
        None => None,
    };
    let files = tools::list_files(source, opts).await.map_err(to_rpc_error)?;
    Ok(serde_json::to_value(files).map_err(invalid_params)?)
}

async fn handle_read_file(server: &ToolServer, arguments: Value) -> jsonrpc_core::Result<Value> {
    let args: ReadFileArgs = serde_json::from_value(arguments).map_err(invalid_params)?;
    let mut session = load_session(server.store.as_ref(), &args.index_name, &server.config.auth, false)
        .await
        .map_err(to_rpc_error)?;
    let opts = ReadFileOptions {
        start_line: args.start_line,
        end_line: args.end_line,
        search_pattern: args.search_pattern,
        context_lines_before: args.context_lines_before,
        context_lines_after: args.context_lines_after,
        include_line_numbers: args.include_line_numbers.unwrap_or(false),
    };
    let source: Option<&mut dyn semindex_core::source::Source> = match session.source.as_mut() {
        Some(b) => Some(&mut **b),
        None => None,
    };
    let out = tools::read_file(source, &args.path, opts).await.map_err(to_rpc_error)?;
    Ok(serde_json::to_value(out).map_err(invalid_params)?)
}
