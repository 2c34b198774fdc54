//! Bitbucket-shaped Source adapter, talking to the Bitbucket Cloud
//! REST API 2.0 directly via `reqwest`.

use std::io::Read;

use async_trait::async_trait;
use semindex_core::errors::IndexError;
use semindex_core::filter::FilterPipeline;
use semindex_core::model::{BitbucketConfig, FileChanges, FileEntry, FileInfo, FileKind, SourceMetadata};
use semindex_core::source::{reject_traversal, ReadOptions, Source};

use super::{classify_changes, ChangeStatus, ChangedFile};

pub struct BitbucketSource {
    config: BitbucketConfig,
    token: Option<String>,
    http: reqwest::Client,
    resolved_ref: Option<String>,
}

impl BitbucketSource {
    pub fn new(config: BitbucketConfig, token: Option<String>) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .user_agent("semindex")
            .build()
            .map_err(|e| IndexError::config(format!("building HTTP client: {e}")))?;
        Ok(Self { config, token, http, resolved_ref: None })
    }

    fn api_base(&self) -> String {
        self.config.base_url.clone().unwrap_or_else(|| "https://api.bitbucket.org/2.0".to_string())
    }

    fn repo_slug(&self) -> String {
        format!("{}/{}", self.config.workspace, self.config.repo)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn resolve_ref(&mut self) -> Result<String, IndexError> {
        if let Some(sha) = &self.resolved_ref {
            return Ok(sha.clone());
        }

        #[derive(serde::Deserialize)]
        struct Target {
            hash: String,
        }
        #[derive(serde::Deserialize)]
        struct BranchOrCommit {
            target: Option<Target>,
            hash: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct Repo {
            mainbranch: Option<MainBranch>,
        }
        #[derive(serde::Deserialize)]
        struct MainBranch {
            name: String,
        }

        let branch = match &self.config.r#ref {
            Some(r) => r.clone(),
            None => {
                let url = format!("{}/repositories/{}", self.api_base(), self.repo_slug());
                let repo: Repo = self
                    .request(&url)
                    .send()
                    .await
                    .map_err(|e| IndexError::transport(format!("fetching repo: {e}")))?
                    .json()
                    .await
                    .map_err(|e| IndexError::transport(format!("parsing repo response: {e}")))?;
                repo.mainbranch.map(|b| b.name).unwrap_or_else(|| "main".to_string())
            }
        };

        let url = format!("{}/repositories/{}/refs/branches/{}", self.api_base(), self.repo_slug(), branch);
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("resolving ref: {e}")))?;
        let sha = if resp.status().is_success() {
            let item: BranchOrCommit =
                resp.json().await.map_err(|e| IndexError::transport(format!("parsing ref response: {e}")))?;
            item.target.map(|t| t.hash).or(item.hash).unwrap_or(branch.clone())
        } else {
            branch.clone()
        };

        self.resolved_ref = Some(sha.clone());
        Ok(sha)
    }

    async fn fetch_file(&self, path: &str, reference: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let url = format!("{}/repositories/{}/src/{}/{}", self.api_base(), self.repo_slug(), reference, path);
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
impl Source for BitbucketSource {
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
        let sha = self.resolve_ref().await?;
        let url = format!(
            "https://bitbucket.org/{}/get/{}.tar.gz",
            self.repo_slug(),
            sha
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
        struct DiffStatPath {
            path: String,
        }
        #[derive(serde::Deserialize)]
        struct DiffStatEntry {
            status: String,
            old: Option<DiffStatPath>,
            new: Option<DiffStatPath>,
        }
        #[derive(serde::Deserialize)]
        struct DiffStatPage {
            values: Vec<DiffStatEntry>,
        }

        let url = format!(
            "{}/repositories/{}/diffstat/{}..{}",
            self.api_base(),
            self.repo_slug(),
            current,
            previous_ref
        );
        let resp = self.request(&url).send().await;
        let page: DiffStatPage = match resp {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(p) => p,
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        };

        let changed: Vec<ChangedFile> = page
            .values
            .into_iter()
            .filter_map(|entry| {
                let status = match entry.status.as_str() {
                    "added" => ChangeStatus::Added,
                    "removed" => ChangeStatus::Removed,
                    "renamed" => {
                        ChangeStatus::Renamed { old_path: entry.old.as_ref().map(|p| p.path.clone()).unwrap_or_default() }
                    }
                    _ => ChangeStatus::Modified,
                };
                let path = entry.new.or(entry.old)?.path;
                Some(ChangedFile { path, status })
            })
            .collect();

        let api_base = self.api_base();
        let repo_slug = self.repo_slug();
        let token = self.token.clone();
        let head = current.clone();
        classify_changes(changed, move |path| {
            let api_base = api_base.clone();
            let repo_slug = repo_slug.clone();
            let token = token.clone();
            let head = head.clone();
            async move { fetch_file_standalone(&api_base, &repo_slug, &token, &head, &path).await }
        })
        .await
    }

    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError> {
        let resolved = self.resolve_ref().await?;
        Ok(SourceMetadata::Bitbucket {
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
        struct Entry {
            path: String,
            #[serde(rename = "type")]
            kind: String,
        }
        #[derive(serde::Deserialize)]
        struct Page {
            values: Vec<Entry>,
        }

        let dir = directory.unwrap_or("");
        let url = format!("{}/repositories/{}/src/{}/{}?pagelen=100", self.api_base(), self.repo_slug(), sha, dir);
        let resp = self.request(&url).send().await.map_err(|e| IndexError::transport(format!("listing src: {e}")))?;
        if !resp.status().is_success() {
            return Err(IndexError::transport(format!("listing src failed: {}", resp.status())));
        }
        let page: Page = resp.json().await.map_err(|e| IndexError::transport(format!("parsing listing: {e}")))?;
        Ok(page
            .values
            .into_iter()
            .map(|e| FileInfo { path: e.path, kind: if e.kind == "commit_directory" { FileKind::Directory } else { FileKind::File } })
            .collect())
    }

    async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
        reject_traversal(path)?;
        let sha = self.resolve_ref().await?;
        self.fetch_file(path, &sha).await
    }
}

async fn fetch_file_standalone(
    api_base: &str,
    repo_slug: &str,
    token: &Option<String>,
    reference: &str,
    path: &str,
) -> Result<Option<Vec<u8>>, IndexError> {
    let client = reqwest::Client::new();
    let url = format!("{api_base}/repositories/{repo_slug}/src/{reference}/{path}");
    let mut req = client.get(&url);
    if let Some(t) = token {
        req = req.bearer_auth(t);
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
