//! Local-directory `Writer`: one JSON file per
//! sanitized name under a root directory. `save` writes to a sibling
//! `.tmp` file and renames it into place so readers never observe a
//! half-written state. Two distinct names that sanitize to the same key
//! are a caller error, not a silent overwrite: `save` rejects the second
//! name once the first has claimed the key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semindex_core::errors::IndexError;
use semindex_core::indexer::IndexStateStore;
use semindex_core::model::IndexState;
use tracing::debug;

use crate::name::sanitize_name;
use crate::traits::{Reader, Writer};

const STATE_EXT: &str = "json";
const NAME_FIELD: &str = "_name";

pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self, name: &str) -> Result<PathBuf, IndexError> {
        let key = sanitize_name(name);
        if key.is_empty() {
            return Err(IndexError::config(format!("name {name:?} sanitizes to an empty key")));
        }
        Ok(self.root.join(format!("{key}.{STATE_EXT}")))
    }

    async fn read_state(path: &Path) -> Result<Option<IndexState>, IndexError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| IndexError::integrity(format!("{}: {e}", path.display())))?;
                Ok(Some(IndexState::from_json(value)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::transport(format!("reading {}: {e}", path.display()))),
        }
    }

    /// Returns the original (pre-sanitization) name stored alongside the
    /// state at `path`, if any state is persisted there yet.
    async fn existing_name(path: &Path) -> Result<Option<String>, IndexError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| IndexError::integrity(format!("{}: {e}", path.display())))?;
                Ok(value.get(NAME_FIELD).and_then(|v| v.as_str()).map(str::to_string))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::transport(format!("reading {}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl Reader for LocalDirStore {
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        let path = self.state_path(name)?;
        Self::read_state(&path).await
    }

    async fn list(&self) -> Result<Vec<String>, IndexError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(IndexError::transport(format!("listing {}: {e}", self.root.display()))),
        };
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| IndexError::transport(format!("listing store: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(STATE_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl Writer for LocalDirStore {
    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError> {
        let path = self.state_path(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IndexError::transport(format!("creating {}: {e}", parent.display())))?;
        }

        if let Some(existing) = Self::existing_name(&path).await? {
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
            serde_json::to_vec_pretty(&doc).map_err(|e| IndexError::integrity(format!("serializing state for {name}: {e}")))?;

        let tmp = path.with_extension(format!("{STATE_EXT}.tmp"));
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| IndexError::transport(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| IndexError::transport(format!("renaming {} into place: {e}", tmp.display())))?;
        debug!(name, path = %path.display(), "saved index state");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), IndexError> {
        let path = self.state_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IndexError::transport(format!("deleting {}: {e}", path.display()))),
        }
    }
}

/// Bridges the narrower `IndexStateStore` contract the indexer depends
/// on onto the full `Writer`.
#[async_trait]
impl IndexStateStore for LocalDirStore {
    async fn load(&self, name: &str) -> Result<Option<IndexState>, IndexError> {
        Reader::load(self, name).await
    }

    async fn save(&self, name: &str, state: &IndexState) -> Result<(), IndexError> {
        Writer::save(self, name, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_core::model::SourceMetadata;

    fn sample_state() -> IndexState {
        IndexState {
            context_state: serde_json::json!({"docs": 3}),
            source: SourceMetadata::LocalFs {
                config: semindex_core::model::LocalFsConfig { root_path: "/repo".to_string(), ignore_patterns: None },
                synced_at: SourceMetadata::now_iso8601(),
            },
        }
    }

    #[tokio::test]
    async fn load_on_empty_store_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        assert!(Reader::load(&store, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        let state = sample_state();
        Writer::save(&store, "my-project", &state).await.unwrap();
        let loaded = Reader::load(&store, "my-project").await.unwrap().unwrap();
        assert_eq!(loaded.context_state, state.context_state);
    }

    #[tokio::test]
    async fn save_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        Writer::save(&store, "proj", &sample_state()).await.unwrap();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["proj.json".to_string()]);
    }

    #[tokio::test]
    async fn different_names_sanitizing_to_the_same_key_is_a_caller_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        Writer::save(&store, "a/b", &sample_state()).await.unwrap();
        let err = Writer::save(&store, "a b", &sample_state()).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
        // the first writer's state is untouched
        let loaded = Reader::load(&store, "a/b").await.unwrap().unwrap();
        assert_eq!(loaded.context_state, sample_state().context_state);
    }

    #[tokio::test]
    async fn resaving_the_same_name_does_not_collide_with_itself() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        Writer::save(&store, "proj", &sample_state()).await.unwrap();
        Writer::save(&store, "proj", &sample_state()).await.unwrap();
        assert!(Reader::load(&store, "proj").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        Writer::save(&store, "proj", &sample_state()).await.unwrap();
        store.delete("proj").await.unwrap();
        store.delete("proj").await.unwrap();
        assert!(Reader::load(&store, "proj").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_enumerates_saved_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        Writer::save(&store, "one", &sample_state()).await.unwrap();
        Writer::save(&store, "two", &sample_state()).await.unwrap();
        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);
    }
}
