//! Git-host-A webhook dispatcher: verifies an
//! HMAC-SHA-256 signature with constant-time comparison, ignores
//! non-push events and branch deletions (optionally deleting the
//! index), and otherwise pins a GitHub Source at the pushed commit and
//! runs the Indexer.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use semindex_core::engine::{EngineAuth, InMemoryEngineFactory};
use semindex_core::indexer::Indexer;
use semindex_core::model::{GitHubConfig, SourceMetadata};
use semindex_store::{AsIndexStateStore, Writer};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

pub struct WebhookServer {
    pub store: Arc<dyn Writer>,
    pub auth: EngineAuth,
    pub secret: String,
    pub delete_on_branch_deletion: bool,
    pub name_fn: fn(&str, &str, &str) -> String,
}

pub fn default_index_name(owner: &str, repo: &str, branch: &str) -> String {
    format!("{owner}/{repo}/{branch}")
}

#[derive(Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    after: String,
    deleted: bool,
    repository: PushRepository,
}

#[derive(Deserialize)]
struct PushRepository {
    name: String,
    owner: PushOwner,
}

#[derive(Deserialize)]
struct PushOwner {
    #[serde(alias = "login", alias = "name")]
    login: String,
}

fn verify_signature(secret: &str, signature_header: &str, body: &[u8]) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else { return false };
    let Ok(signature) = hex::decode(hex_sig) else { return false };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.len() == signature.len() && bool::from(expected.ct_eq(&signature))
}

pub async fn handle_webhook(State(server): State<Arc<WebhookServer>>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing signature header").into_response();
    };
    if !verify_signature(&server.secret, signature, &body) {
        return (StatusCode::UNAUTHORIZED, "signature mismatch").into_response();
    }

    let event = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
    if event != "push" {
        return (StatusCode::OK, "ignored: non-push event").into_response();
    }

    let push: PushEvent = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("malformed push event: {e}")).into_response(),
    };

    let branch = match push.git_ref.strip_prefix("refs/heads/") {
        Some(b) => b.to_string(),
        None => return (StatusCode::OK, "ignored: non-branch ref").into_response(),
    };
    let owner = push.repository.owner.login;
    let repo = push.repository.name;
    let name = (server.name_fn)(&owner, &repo, &branch);

    if push.deleted {
        if server.delete_on_branch_deletion {
            if let Err(e) = server.store.delete(&name).await {
                warn!(name, error = %e, "deleting index for removed branch");
                return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
            }
            return (StatusCode::OK, "deleted").into_response();
        }
        return (StatusCode::OK, "ignored: branch deletion").into_response();
    }

    let metadata = SourceMetadata::GitHub {
        config: GitHubConfig { owner, repo, r#ref: Some(push.after.clone()) },
        resolved_ref: Some(push.after),
        synced_at: SourceMetadata::now_iso8601(),
    };
    let mut source = match semindex_sources::factory::build_source(&metadata) {
        Ok(s) => s,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let indexer = Indexer::new(server.auth.clone());
    let state_store = AsIndexStateStore(server.store.as_ref());
    match indexer.index(source.as_mut(), &state_store, &InMemoryEngineFactory, &name).await {
        Ok(result) => {
            info!(name, ?result, "webhook-triggered index run complete");
            (StatusCode::OK, "indexed").into_response()
        }
        Err(e) => {
            warn!(name, error = %e, "webhook-triggered index run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_matching_signature() {
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let sig = sign("topsecret", body);
        assert!(verify_signature("topsecret", &sig, body));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let sig = sign("topsecret", body);
        assert!(!verify_signature("different", &sig, body));
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(!verify_signature("topsecret", "not-a-signature", b"body"));
    }

    #[test]
    fn default_name_joins_owner_repo_branch() {
        assert_eq!(default_index_name("acme", "widgets", "main"), "acme/widgets/main");
    }
}
