//! S3-compatible `Writer`: one object per
//! sanitized name under `prefix/`. A `PUT` is a single atomic write at
//! the object-store layer, so `save` needs no temp-then-rename dance.
//! As with the local backend, a name collision after sanitization is
//! rejected rather than silently overwriting the first claimant.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use semindex_core::errors::IndexError;
use semindex_core::indexer::IndexStateStore;
use semindex_core::model::IndexState;
use tracing::debug;

use crate::name::sanitize_name;
use crate::traits::{Reader, Writer};

const NAME_FIELD: &str = "_name";

pub struct ObjectStoreConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    /// Custom S3-compatible endpoint (MinIO, R2, ...); `None` uses AWS.
    pub endpoint_url: Option<String>,
    /// Force path-style addressing (`endpoint/bucket/key`), required by
    /// most non-AWS S3-compatible backends.
    pub force_path_style: bool,
}

pub struct ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl ObjectStore {
    pub async fn new(config: ObjectStoreConfig) -> Result<Self, IndexError> {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        let prefix = match config.prefix {
            Some(p) if !p.is_empty() => format!("{}/", p.trim_matches('/')),
            _ => String::new(),
        };

        Ok(Self { client, bucket: config.bucket, prefix })
    }

    fn key(&self, name: &str) -> Result<String, IndexError> {
        let sanitized = sanitize_name(name);
        if sanitized.is_empty() {
            return Err(IndexError::config(format!("name {name:?} sanitizes to an empty key")));
        }
        Ok(format!("{}{}.json", self.prefix, sanitized))
    }

    /// Returns the original (pre-sanitization) name stored alongside the
    /// object at `key`, if any object is persisted there yet.
    async fn existing_name(&self, key: &str) -> Result<Option<String>, IndexError> {
        let result = self.client.get_object().bucket(&self.bucket).key(key).send().await;
        let output = match result {
            Ok(o) => o,
            Err(e) => {
                if is_not_found(&e) {
                    return Ok(None);
                }
                return Err(IndexError::transport(format!("getting s3://{}/{key}: {e}", self.bucket)));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| IndexError::transport(format!("reading s3://{}/{key} body: {e}", self.bucket)))?
            .into_bytes();
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::integrity(format!("{key}: {e}")))?;
        Ok(value.get(NAME_FIELD).and_then(|v| v.as_str()).map(str::to_string))
    }
}

#[async_trait]
impl Reader for ObjectStore {
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        let key = self.key(name)?;
        let result = self.client.get_object().bucket(&self.bucket).key(&key).send().await;
        let output = match result {
            Ok(o) => o,
            Err(e) => {
                if is_not_found(&e) {
                    return Ok(None);
                }
                return Err(IndexError::transport(format!("getting s3://{}/{key}: {e}", self.bucket)));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| IndexError::transport(format!("reading s3://{}/{key} body: {e}", self.bucket)))?
            .into_bytes();
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::integrity(format!("{key}: {e}")))?;
        Ok(Some(IndexState::from_json(value)?))
    }

    async fn list(&self) -> Result<Vec<String>, IndexError> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(&self.prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let page = req.send().await.map_err(|e| IndexError::transport(format!("listing s3://{}: {e}", self.bucket)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    if let Some(stem) = key.strip_prefix(&self.prefix).and_then(|s| s.strip_suffix(".json")) {
                        names.push(stem.to_string());
                    }
                }
            }
            continuation = page.next_continuation_token().map(|s| s.to_string());
            if continuation.is_none() {
                break;
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl Writer for ObjectStore {
    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError> {
        let key = self.key(name)?;

        if let Some(existing) = self.existing_name(&key).await? {
            if existing != name {
                return Err(IndexError::config(format!(
                    "name {name:?} sanitizes to the same key as existing index {existing:?}; \
                     rename one of them to avoid a collision"
                )));
            }
        }

        let mut doc = state.to_json()?;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(NAME_FIELD.to_string(), serde_json::Value::String(name.to_string()));
        }
        let bytes =
            serde_json::to_vec(&doc).map_err(|e| IndexError::integrity(format!("serializing state for {name}: {e}")))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| IndexError::transport(format!("putting s3://{}/{key}: {e}", self.bucket)))?;
        debug!(name, key, "saved index state to object store");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), IndexError> {
        let key = self.key(name)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| IndexError::transport(format!("deleting s3://{}/{key}: {e}", self.bucket)))?;
        Ok(())
    }
}

#[async_trait]
impl IndexStateStore for ObjectStore {
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        Reader::load(self, name).await
    }

    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError> {
        Writer::save(self, name, state).await
    }
}

fn is_not_found<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool
where
    E: std::error::Error + 'static,
{
    err.raw_response().map(|r| r.status().as_u16() == 404).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_normalized_prefix() {
        let store = ObjectStore { client: dummy_client(), bucket: "b".to_string(), prefix: "idx/".to_string() };
        assert_eq!(store.key("owner/repo").unwrap(), "idx/owner_repo.json");
    }

    #[test]
    fn empty_prefix_produces_bare_key() {
        let store = ObjectStore { client: dummy_client(), bucket: "b".to_string(), prefix: String::new() };
        assert_eq!(store.key("proj").unwrap(), "proj.json");
    }

    fn dummy_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new("test", "test", None, None, "test"))
            .build();
        Client::from_conf(config)
    }
}
