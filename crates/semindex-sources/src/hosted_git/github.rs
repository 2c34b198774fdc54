//! GitHub-shaped Source adapter. Uses `octocrab` for ref resolution,
//! commit comparison, and single-file reads (the well-trodden part of
//! the GitHub REST surface); falls back to direct `reqwest` calls for
//! the recursive tree listing and tarball download, where a typed
//! client buys little over the raw endpoint.

use std::io::Read;

use async_trait::async_trait;
use octocrab::Octocrab;
use semindex_core::errors::IndexError;
use semindex_core::model::{FileChanges, FileEntry, FileInfo, FileKind, GitHubConfig, SourceMetadata};
use semindex_core::source::{reject_traversal, ReadOptions, Source};

use super::{classify_changes, ChangeStatus, ChangedFile};

pub struct GitHubSource {
    config: GitHubConfig,
    token: Option<String>,
    client: Octocrab,
    http: reqwest::Client,
    resolved_ref: Option<String>,
}

impl GitHubSource {
    pub fn new(config: GitHubConfig, token: Option<String>) -> Result<Self, IndexError> {
        let mut builder = Octocrab::builder();
        if let Some(t) = &token {
            builder = builder.personal_token(t.clone());
        }
        let client = builder.build().map_err(|e| IndexError::config(format!("building GitHub client: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent("semindex")
            .build()
            .map_err(|e| IndexError::config(format!("building HTTP client: {e}")))?;
        Ok(Self { config, token, client, http, resolved_ref: None })
    }

    async fn resolve_ref(&mut self) -> Result<String, IndexError> {
        if let Some(sha) = &self.resolved_ref {
            return Ok(sha.clone());
        }
        let reference = self.config.r#ref.clone().unwrap_or_else(|| "HEAD".to_string());
        let sha = if reference == "HEAD" {
            let repo = self
                .client
                .repos(&self.config.owner, &self.config.repo)
                .get()
                .await
                .map_err(|e| IndexError::transport(format!("fetching repo metadata: {e}")))?;
            let default_branch = repo.default_branch.unwrap_or_else(|| "main".to_string());
            self.resolve_branch(&default_branch).await?
        } else {
            self.resolve_branch(&reference).await.or_else(|_| Ok(reference.clone()))?
        };
        self.resolved_ref = Some(sha.clone());
        Ok(sha)
    }

    async fn resolve_branch(&self, branch: &str) -> Result<String, IndexError> {
        let r = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .get_ref(&octocrab::params::repos::Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| IndexError::transport(format!("resolving ref {branch}: {e}")))?;
        match r.object {
            octocrab::models::repos::Object::Commit { sha, .. } => Ok(sha),
            octocrab::models::repos::Object::Tag { sha, .. } => Ok(sha),
            _ => Err(IndexError::transport(format!("unexpected ref object for {branch}"))),
        }
    }

    fn auth_header(&self) -> Result<String, IndexError> {
        let token = self.token.as_deref().ok_or_else(|| IndexError::config("SEMINDEX_GITHUB_TOKEN is not set"))?;
        Ok(format!("Bearer {token}"))
    }

    async fn fetch_tarball(&self, sha: &str) -> Result<Vec<u8>, IndexError> {
        let url = format!("https://api.github.com/repos/{}/{}/tarball/{sha}", self.config.owner, self.config.repo);
        let mut req = self.http.get(&url).header("Accept", "application/vnd.github+json");
        if let Ok(auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }
        let resp = req.send().await.map_err(|e| IndexError::transport(format!("downloading tarball: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("tarball download failed: {}", resp.status())));
        }
        resp.bytes().await.map(|b| b.to_vec()).map_err(|e| IndexError::transport(format!("reading tarball body: {e}")))
    }

    async fn fetch_tree(&self, sha: &str) -> Result<Vec<(String, bool)>, IndexError> {
        #[derive(serde::Deserialize)]
        struct TreeEntry {
            path: String,
            #[serde(rename = "type")]
            kind: String,
        }
        #[derive(serde::Deserialize)]
        struct TreeResponse {
            tree: Vec<TreeEntry>,
        }

        let url = format!(
            "https://api.github.com/repos/{}/{}/git/trees/{sha}?recursive=1",
            self.config.owner, self.config.repo
        );
        let mut req = self.http.get(&url).header("Accept", "application/vnd.github+json");
        if let Ok(auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }
        let resp = req.send().await.map_err(|e| IndexError::transport(format!("fetching tree: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("tree fetch failed: {}", resp.status())));
        }
        let body: TreeResponse =
            resp.json().await.map_err(|e| IndexError::transport(format!("parsing tree response: {e}")))?;
        Ok(body.tree.into_iter().map(|t| (t.path, t.kind == "tree")).collect())
    }
}

#[async_trait]
impl Source for GitHubSource {
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
        let sha = self.resolve_ref().await?;
        let bytes = self.fetch_tarball(&sha).await?;

        let decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut archive = tar::Archive::new(decoder);
        let entries = archive.entries().map_err(|e| IndexError::integrity(format!("reading tarball entries: {e}")))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| IndexError::integrity(format!("reading tarball entry: {e}")))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw_path = entry.path().map_err(|e| IndexError::integrity(format!("bad entry path: {e}")))?;
            let raw_path = raw_path.to_string_lossy().replace('\\', "/");
            // GitHub archives wrap everything in a synthetic
            // `owner-repo-sha/` root directory; strip it.
            let stripped = match raw_path.split_once('/') {
                Some((_, rest)) if !rest.is_empty() => rest.to_string(),
                _ => continue,
            };
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| IndexError::integrity(format!("reading {stripped}: {e}")))?;
            candidates.push((stripped, buf));
        }

        let pipeline = semindex_core::filter::FilterPipeline::new(std::path::Path::new("."), None, None);
        let report = pipeline.scan(candidates);
        Ok(report.admitted)
    }

    async fn fetch_changes(&mut self, previous: &SourceMetadata) -> Result<Option<FileChanges>, IndexError> {
        let previous_ref = match previous.resolved_ref() {
            Some(r) => r.to_string(),
            None => return Ok(None),
        };
        let current = self.resolve_ref().await?;
        if current == previous_ref {
            return Ok(Some(FileChanges::default()));
        }

        let comparison = self
            .client
            .commits(&self.config.owner, &self.config.repo)
            .compare(&previous_ref, &current)
            .send()
            .await;
        let comparison = match comparison {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };

        let changed: Vec<ChangedFile> = comparison
            .files
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| {
                let status = match f.status {
                    octocrab::models::repos::DiffEntryStatus::Added => ChangeStatus::Added,
                    octocrab::models::repos::DiffEntryStatus::Removed => ChangeStatus::Removed,
                    octocrab::models::repos::DiffEntryStatus::Renamed => ChangeStatus::Renamed { old_path: f.previous_filename.unwrap_or_default() },
                    _ => ChangeStatus::Modified,
                };
                Some(ChangedFile { path: f.filename, status })
            })
            .collect();

        let client = &self.client;
        let owner = self.config.owner.clone();
        let repo = self.config.repo.clone();
        let head = current.clone();
        classify_changes(changed, move |path| {
            let client = client.clone();
            let owner = owner.clone();
            let repo = repo.clone();
            let head = head.clone();
            async move { fetch_contents(&client, &owner, &repo, &head, &path).await }
        })
        .await
    }

    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError> {
        let resolved = self.resolve_ref().await?;
        Ok(SourceMetadata::GitHub {
            config: self.config.clone(),
            resolved_ref: Some(resolved),
            synced_at: SourceMetadata::now_iso8601(),
        })
    }

    async fn list_files(&mut self, directory: Option<&str>) -> Result<Vec<FileInfo>, IndexError> {
        if let Some(dir) = directory {
            reject_traversal(dir)?;
        }
        let sha = self.resolve_ref().await?;
        let tree = self.fetch_tree(&sha).await?;
        let prefix = directory.map(|d| format!("{d}/")).unwrap_or_default();

        Ok(tree
            .into_iter()
            .filter_map(|(path, is_dir)| {
                let rest = path.strip_prefix(&prefix as &str)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(FileInfo { path, kind: if is_dir { FileKind::Directory } else { FileKind::File } })
            })
            .collect())
    }

    async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
        reject_traversal(path)?;
        let sha = self.resolve_ref().await?;
        fetch_contents(&self.client, &self.config.owner, &self.config.repo, &sha, path).await
    }
}

async fn fetch_contents(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    reference: &str,
    path: &str,
) -> Result<Option<Vec<u8>>, IndexError> {
    let result = client.repos(owner, repo).get_content().path(path).r#ref(reference).send().await;
    let mut items = match result {
        Ok(items) => items,
        Err(_) => return Ok(None),
    };
    let Some(item) = items.items.pop() else {
        return Ok(None);
    };
    match item.decoded_content() {
        Some(text) => Ok(Some(text.into_bytes())),
        None => Ok(None),
    }
}
