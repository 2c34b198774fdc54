//! The local filesystem source. Never supports incremental updates:
//! every sync is a full walk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semindex_core::errors::IndexError;
use semindex_core::filter::FilterPipeline;
use semindex_core::model::{FileChanges, FileEntry, FileInfo, FileKind, LocalFsConfig, SourceMetadata};
use semindex_core::source::{reject_traversal, ReadOptions, Source};

/// Directory basenames skipped before filtering is even attempted.
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "__pycache__", ".venv", "venv"];

pub struct LocalFsSource {
    config: LocalFsConfig,
}

impl LocalFsSource {
    pub fn new(config: LocalFsConfig) -> Self {
        Self { config }
    }

    fn root(&self) -> &Path {
        Path::new(&self.config.root_path)
    }

    fn pipeline(&self) -> FilterPipeline {
        let root = self.root();
        let augment = std::fs::read_to_string(root.join(".augmentignore")).ok();
        let git = std::fs::read_to_string(root.join(".gitignore")).ok();
        let mut pipeline = FilterPipeline::new(root, augment.as_deref(), git.as_deref());
        if let Some(extra) = &self.config.ignore_patterns {
            // Custom ignore patterns supplied via config ride along with
            // augmentignore: same "user intent" priority tier.
            let joined = extra.join("\n");
            pipeline = FilterPipeline::new(root, Some(&joined), git.as_deref());
        }
        pipeline
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IndexError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| IndexError::transport(format!("reading directory {}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::transport(format!("reading directory entry: {e}")))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| IndexError::transport(format!("stat: {e}")))?;
            let basename = entry.file_name();
            let basename = basename.to_string_lossy();
            if file_type.is_dir() {
                if SKIP_DIRS.contains(&basename.as_ref()) {
                    continue;
                }
                self.walk(&path, out)?;
            } else if file_type.is_file() {
                out.push(path);
            }
        }
        Ok(())
    }

    fn relative_path(&self, abs: &Path) -> Result<String, IndexError> {
        let rel = abs
            .strip_prefix(self.root())
            .map_err(|_| IndexError::integrity(format!("{} is not under source root", abs.display())))?;
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }
}

#[async_trait]
impl Source for LocalFsSource {
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
        let mut paths = Vec::new();
        self.walk(self.root(), &mut paths)?;

        let mut candidates = Vec::with_capacity(paths.len());
        for abs in &paths {
            let rel = self.relative_path(abs)?;
            let bytes = std::fs::read(abs).map_err(|e| IndexError::transport(format!("reading {rel}: {e}")))?;
            candidates.push((rel, bytes));
        }

        let report = self.pipeline().scan(candidates);
        Ok(report.admitted)
    }

    async fn fetch_changes(&mut self, _previous: &SourceMetadata) -> Result<Option<FileChanges>, IndexError> {
        Ok(None)
    }

    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError> {
        Ok(SourceMetadata::LocalFs { config: self.config.clone(), synced_at: SourceMetadata::now_iso8601() })
    }

    async fn list_files(&mut self, directory: Option<&str>) -> Result<Vec<FileInfo>, IndexError> {
        if let Some(dir) = directory {
            reject_traversal(dir)?;
        }
        let target = match directory {
            Some(dir) => self.root().join(dir),
            None => self.root().to_path_buf(),
        };

        let mut out = Vec::new();
        let entries = std::fs::read_dir(&target)
            .map_err(|e| IndexError::transport(format!("reading directory {}: {e}", target.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::transport(format!("reading directory entry: {e}")))?;
            let file_type = entry.file_type().map_err(|e| IndexError::transport(format!("stat: {e}")))?;
            let rel = self.relative_path(&entry.path())?;
            let kind = if file_type.is_dir() { FileKind::Directory } else { FileKind::File };
            out.push(FileInfo { path: rel, kind });
        }
        Ok(out)
    }

    async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
        reject_traversal(path)?;
        match std::fs::read(self.root().join(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::transport(format!("reading {path}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn fetch_all_skips_vcs_dirs_and_applies_filter() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "hello");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = {}");
        write(dir.path(), "sub/b.md", "# hi");

        let mut src = LocalFsSource::new(LocalFsConfig { root_path: dir.path().to_string_lossy().to_string(), ignore_patterns: None });
        let mut entries = src.fetch_all().await.unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/b.md"]);
    }

    #[tokio::test]
    async fn fetch_changes_is_always_none() {
        let dir = tempdir().unwrap();
        let mut src = LocalFsSource::new(LocalFsConfig { root_path: dir.path().to_string_lossy().to_string(), ignore_patterns: None });
        let prev = SourceMetadata::LocalFs {
            config: LocalFsConfig { root_path: dir.path().to_string_lossy().to_string(), ignore_patterns: None },
            synced_at: SourceMetadata::now_iso8601(),
        };
        assert!(src.fetch_changes(&prev).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_file_rejects_traversal() {
        let dir = tempdir().unwrap();
        let mut src = LocalFsSource::new(LocalFsConfig { root_path: dir.path().to_string_lossy().to_string(), ignore_patterns: None });
        let err = src.read_file("../etc/passwd", &ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[tokio::test]
    async fn list_files_is_non_recursive() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "x");
        write(dir.path(), "sub/b.md", "y");
        let mut src = LocalFsSource::new(LocalFsConfig { root_path: dir.path().to_string_lossy().to_string(), ignore_patterns: None });
        let mut listing = src.list_files(None).await.unwrap();
        listing.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].path, "a.txt");
        assert_eq!(listing[1].kind, FileKind::Directory);
    }
}
