//! Shared diff-classification logic for the three hosted-Git-shaped
//! adapters: GitHub/GitLab/Bitbucket share one `fetchChanges` pipeline.
//! Each adapter brings its own HTTP client and
//! wire types; this module only knows about already-decoded statuses.

use std::future::Future;

use semindex_core::errors::IndexError;
use semindex_core::filter::{FilterDecision, FilterPipeline};
use semindex_core::model::{FileChanges, FileEntry};

pub mod bitbucket;
#[cfg(feature = "github")]
pub mod github;
pub mod gitlab;

const MAX_DIFF_ENTRIES: usize = 100;

/// A single changed path between two resolved refs, already normalized
/// to one of the four statuses a VCS compare API can report.
#[derive(Debug, Clone)]
pub enum ChangeStatus {
    Added,
    Modified,
    Removed,
    Renamed { old_path: String },
}

#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    pub status: ChangeStatus,
}

fn is_ignore_file(path: &str) -> bool {
    matches!(path, ".gitignore" | ".augmentignore")
}

/// Runs the hosted-Git `fetchChanges` decision tree over an
/// already-fetched compare result. `fetch_content` retrieves a file's
/// bytes at the *current* ref; it is only called for added/modified
/// (including the new side of a rename) paths.
pub async fn classify_changes<F, Fut>(
    changed: Vec<ChangedFile>,
    mut fetch_content: F,
) -> Result<Option<FileChanges>, IndexError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Vec<u8>>, IndexError>>,
{
    if changed.iter().any(|c| is_ignore_file(&c.path)) {
        return Ok(None);
    }
    if changed.len() > MAX_DIFF_ENTRIES {
        return Ok(None);
    }

    let pipeline = FilterPipeline::new(std::path::Path::new("."), None, None);
    let mut added = Vec::new();
    let mut modified = Vec::new();
    let mut removed = Vec::new();

    for change in changed {
        match change.status {
            ChangeStatus::Removed => removed.push(change.path),
            ChangeStatus::Added | ChangeStatus::Modified => {
                if let Some(entry) = fetch_and_filter(&pipeline, &mut fetch_content, &change.path).await? {
                    match change.status {
                        ChangeStatus::Added => added.push(entry),
                        _ => modified.push(entry),
                    }
                }
            }
            ChangeStatus::Renamed { old_path } => {
                removed.push(old_path);
                if let Some(entry) = fetch_and_filter(&pipeline, &mut fetch_content, &change.path).await? {
                    added.push(entry);
                }
            }
        }
    }

    Ok(Some(FileChanges { added, modified, removed }))
}

async fn fetch_and_filter<F, Fut>(
    pipeline: &FilterPipeline,
    fetch_content: &mut F,
    path: &str,
) -> Result<Option<FileEntry>, IndexError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Vec<u8>>, IndexError>>,
{
    let bytes = match fetch_content(path.to_string()).await? {
        Some(b) => b,
        None => return Ok(None),
    };
    match pipeline.filter(path, &bytes) {
        FilterDecision::Admit => {
            let contents = String::from_utf8(bytes)
                .map_err(|e| IndexError::integrity(format!("{path}: not valid utf-8 after admit: {e}")))?;
            Ok(Some(FileEntry::new(path, contents)))
        }
        FilterDecision::Reject(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ignore_file_change_forces_full() {
        let changed = vec![ChangedFile { path: ".gitignore".to_string(), status: ChangeStatus::Modified }];
        let result = classify_changes(changed, |_| async { Ok(Some(b"x".to_vec())) }).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn diff_storm_forces_full() {
        let changed: Vec<ChangedFile> = (0..101)
            .map(|i| ChangedFile { path: format!("f{i}.txt"), status: ChangeStatus::Added })
            .collect();
        let result = classify_changes(changed, |_| async { Ok(Some(b"x".to_vec())) }).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rename_records_old_as_removed_and_new_as_added() {
        let changed = vec![ChangedFile {
            path: "new.txt".to_string(),
            status: ChangeStatus::Renamed { old_path: "old.txt".to_string() },
        }];
        let result = classify_changes(changed, |_| async { Ok(Some(b"hi".to_vec())) }).await.unwrap().unwrap();
        assert_eq!(result.removed, vec!["old.txt".to_string()]);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].path, "new.txt");
    }

    #[tokio::test]
    async fn keyish_added_file_is_silently_dropped_not_erred() {
        let changed = vec![ChangedFile { path: "id_rsa".to_string(), status: ChangeStatus::Added }];
        let result = classify_changes(changed, |_| async { Ok(Some(b"secret".to_vec())) }).await.unwrap().unwrap();
        assert!(result.added.is_empty());
        assert!(result.is_empty());
    }
}
