//! GitLab-shaped Source adapter, talking to the GitLab REST API v4
//! directly via `reqwest` (no typed GitLab client is in the example
//! pack's dependency set, unlike GitHub's `octocrab`).

use std::io::Read;

use async_trait::async_trait;
use semindex_core::errors::IndexError;
use semindex_core::filter::FilterPipeline;
use semindex_core::model::{FileChanges, FileEntry, FileInfo, FileKind, GitLabConfig, SourceMetadata};
use semindex_core::source::{reject_traversal, ReadOptions, Source};

use super::{classify_changes, ChangeStatus, ChangedFile};

pub struct GitLabSource {
    config: GitLabConfig,
    token: Option<String>,
    http: reqwest::Client,
    resolved_ref: Option<String>,
}

impl GitLabSource {
    pub fn new(config: GitLabConfig, token: Option<String>) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .user_agent("semindex")
            .build()
            .map_err(|e| IndexError::config(format!("building HTTP client: {e}")))?;
        Ok(Self { config, token, http, resolved_ref: None })
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone().unwrap_or_else(|| "https://gitlab.com".to_string())
    }

    fn project_path(&self) -> String {
        urlencoding_project(&self.config.project_id)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.header("PRIVATE-TOKEN", token);
        }
        req
    }

    async fn resolve_ref(&mut self) -> Result<String, IndexError> {
        if let Some(sha) = &self.resolved_ref {
            return Ok(sha.clone());
        }

        let branch = self.config.r#ref.clone().unwrap_or_else(|| "HEAD".to_string());
        let sha = if branch == "HEAD" {
            #[derive(serde::Deserialize)]
            struct Project {
                default_branch: Option<String>,
            }
            let url = format!("{}/api/v4/projects/{}", self.base_url(), self.project_path());
            let project: Project = self
                .request(&url)
                .send()
                .await
                .map_err(|e| IndexError::transport(format!("fetching project: {e}")))?
                .json()
                .await
                .map_err(|e| IndexError::transport(format!("parsing project response: {e}")))?;
            let default_branch = project.default_branch.unwrap_or_else(|| "main".to_string());
            self.resolve_branch(&default_branch).await?
        } else {
            match self.resolve_branch(&branch).await {
                Ok(sha) => sha,
                Err(_) => branch.clone(),
            }
        };
        self.resolved_ref = Some(sha.clone());
        Ok(sha)
    }

    async fn resolve_branch(&self, branch: &str) -> Result<String, IndexError> {
        #[derive(serde::Deserialize)]
        struct Commit {
            id: String,
        }
        #[derive(serde::Deserialize)]
        struct Branch {
            commit: Commit,
        }
        let url = format!(
            "{}/api/v4/projects/{}/repository/branches/{}",
            self.base_url(),
            self.project_path(),
            urlencoding_component(branch)
        );
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("resolving branch: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("resolving branch {branch} failed: {}", resp.status())));
        }
        let branch: Branch = resp.json().await.map_err(|e| IndexError::transport(format!("parsing branch response: {e}")))?;
        Ok(branch.commit.id)
    }

    async fn fetch_file(&self, path: &str, reference: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let url = format!(
            "{}/api/v4/projects/{}/repository/files/{}/raw?ref={}",
            self.base_url(),
            self.project_path(),
            urlencoding_component(path),
            urlencoding_component(reference)
        );
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("fetching file: {e}")))?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("fetching {path} failed: {}", resp.status())));
        }
        Ok(Some(resp.bytes().await.map_err(|e| IndexError::transport(format!("reading body: {e}")))?.to_vec()))
    }
}

#[async_trait]
impl Source for GitLabSource {
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
        let sha = self.resolve_ref().await?;
        let url = format!(
            "{}/api/v4/projects/{}/repository/archive.tar.gz?sha={}",
            self.base_url(),
            self.project_path(),
            urlencoding_component(&sha)
        );
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("downloading archive: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("archive download failed: {}", resp.status())));
        }
        let bytes = resp.bytes().await.map_err(|e| IndexError::transport(format!("reading archive body: {e}")))?;

        let decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut archive = tar::Archive::new(decoder);
        let entries = archive.entries().map_err(|e| IndexError::integrity(format!("reading archive entries: {e}")))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| IndexError::integrity(format!("reading archive entry: {e}")))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw_path = entry.path().map_err(|e| IndexError::integrity(format!("bad entry path: {e}")))?;
            let raw_path = raw_path.to_string_lossy().replace('\\', "/");
            let stripped = match raw_path.split_once('/') {
                Some((_, rest)) if !rest.is_empty() => rest.to_string(),
                _ => continue,
            };
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| IndexError::integrity(format!("reading {stripped}: {e}")))?;
            candidates.push((stripped, buf));
        }

        let pipeline = FilterPipeline::new(std::path::Path::new("."), None, None);
        Ok(pipeline.scan(candidates).admitted)
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

        #[derive(serde::Deserialize)]
        struct Diff {
            old_path: String,
            new_path: String,
            new_file: bool,
            deleted_file: bool,
            renamed_file: bool,
        }
        #[derive(serde::Deserialize)]
        struct Compare {
            diffs: Vec<Diff>,
        }

        let url = format!(
            "{}/api/v4/projects/{}/repository/compare?from={}&to={}",
            self.base_url(),
            self.project_path(),
            urlencoding_component(&previous_ref),
            urlencoding_component(&current)
        );
        let resp = self.request(&url).send().await;
        let compare: Compare = match resp {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(c) => c,
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        };

        let changed: Vec<ChangedFile> = compare
            .diffs
            .into_iter()
            .map(|d| {
                let status = if d.renamed_file {
                    ChangeStatus::Renamed { old_path: d.old_path }
                } else if d.new_file {
                    ChangeStatus::Added
                } else if d.deleted_file {
                    ChangeStatus::Removed
                } else {
                    ChangeStatus::Modified
                };
                ChangedFile { path: d.new_path, status }
            })
            .collect();

        let this_base = self.base_url();
        let project = self.project_path();
        let token = self.token.clone();
        let head = current.clone();
        classify_changes(changed, move |path| {
            let base = this_base.clone();
            let project = project.clone();
            let token = token.clone();
            let head = head.clone();
            async move { fetch_file_standalone(&base, &project, &token, &path, &head).await }
        })
        .await
    }

    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError> {
        let resolved = self.resolve_ref().await?;
        Ok(SourceMetadata::GitLab {
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

        #[derive(serde::Deserialize)]
        struct TreeEntry {
            path: String,
            #[serde(rename = "type")]
            kind: String,
        }

        let path_param = directory.map(|d| format!("&path={}", urlencoding_component(d))).unwrap_or_default();
        let url = format!(
            "{}/api/v4/projects/{}/repository/tree?ref={}{path_param}&per_page=100",
            self.base_url(),
            self.project_path(),
            urlencoding_component(&sha)
        );
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("listing tree: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("listing tree failed: {}", resp.status())));
        }
        let entries: Vec<TreeEntry> = resp.json().await.map_err(|e| IndexError::transport(format!("parsing tree: {e}")))?;
        Ok(entries
            .into_iter()
            .map(|e| FileInfo { path: e.path, kind: if e.kind == "tree" { FileKind::Directory } else { FileKind::File } })
            .collect())
    }

    async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
        reject_traversal(path)?;
        let sha = self.resolve_ref().await?;
        self.fetch_file(path, &sha).await
    }
}

async fn fetch_file_standalone(
    base_url: &str,
    project_path: &str,
    token: &Option<String>,
    path: &str,
    reference: &str,
) -> Result<Option<Vec<u8>>, IndexError> {
    let client = reqwest::Client::new();
    let url = format!(
        "{base_url}/api/v4/projects/{project_path}/repository/files/{}/raw?ref={}",
        urlencoding_component(path),
        urlencoding_component(reference)
    );
    let mut req = client.get(&url);
    if let Some(t) = token {
        req = req.header("PRIVATE-TOKEN", t);
    }
    let resp = req.send().await.map_err(|e| IndexError::transport(format!("fetching file: {e}")))?;
    if resp.status().as_u16() == 404 {
        return Ok(None);
    }
    if !resp.status().is_success() {
        return Err(IndexError::transport(format!("fetching {path} failed: {}", resp.status())));
    }
    Ok(Some(resp.bytes().await.map_err(|e| IndexError::transport(format!("reading body: {e}")))?.to_vec()))
}

fn urlencoding_project(project_id: &str) -> String {
    urlencoding_component(project_id)
}

fn urlencoding_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
