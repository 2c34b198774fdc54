//! HTTP transport for the tool server: a single
//! JSON-RPC POST endpoint, optional bearer-token auth, configurable
//! CORS.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rpc::{build_io_handler, ToolServer};

pub fn router(server: Arc<ToolServer>) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn handle_rpc(State(server): State<Arc<ToolServer>>, headers: HeaderMap, body: String) -> Response {
    if let Some(expected) = &server.config.http_bearer_token {
        let presented = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, "invalid or missing bearer token").into_response();
        }
    }

    let handler = build_io_handler(server);
    match handler.handle_request(&body).await {
        Some(response) => (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "application/json")], response)
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
