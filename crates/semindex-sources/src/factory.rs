//! The source factory: given a loaded
//! `SourceMetadata`, reconstructs a fresh `Source` targeting the same
//! upstream identity. Secrets are read from the environment at factory
//! time, never persisted in `SourceMetadata`.

use semindex_core::errors::IndexError;
use semindex_core::model::SourceMetadata;
use semindex_core::source::Source;

use crate::hosted_git::bitbucket::BitbucketSource;
#[cfg(feature = "github")]
use crate::hosted_git::github::GitHubSource;
use crate::hosted_git::gitlab::GitLabSource;
use crate::localfs::LocalFsSource;
#[cfg(feature = "web")]
use crate::web::WebSource;

/// Environment variable names read by the factory.
pub mod env {
    pub const GITHUB_TOKEN: &str = "SEMINDEX_GITHUB_TOKEN";
    pub const GITLAB_TOKEN: &str = "SEMINDEX_GITLAB_TOKEN";
    pub const BITBUCKET_TOKEN: &str = "SEMINDEX_BITBUCKET_TOKEN";
}

/// Builds a `Source` trait object for `metadata`. Unknown `type` values
/// are rejected.
pub fn build_source(metadata: &SourceMetadata) -> Result<Box<dyn Source>, IndexError> {
    match metadata {
        SourceMetadata::LocalFs { config, .. } => Ok(Box::new(LocalFsSource::new(config.clone()))),
        #[cfg(feature = "github")]
        SourceMetadata::GitHub { config, .. } => {
            let token = std::env::var(env::GITHUB_TOKEN).ok();
            Ok(Box::new(GitHubSource::new(config.clone(), token)?))
        }
        #[cfg(not(feature = "github"))]
        SourceMetadata::GitHub { .. } => Err(IndexError::config("github source support not compiled in")),
        SourceMetadata::GitLab { config, .. } => {
            let token = std::env::var(env::GITLAB_TOKEN).ok();
            Ok(Box::new(GitLabSource::new(config.clone(), token)?))
        }
        SourceMetadata::Bitbucket { config, .. } => {
            let token = std::env::var(env::BITBUCKET_TOKEN).ok();
            Ok(Box::new(BitbucketSource::new(config.clone(), token)?))
        }
        #[cfg(feature = "web")]
        SourceMetadata::Web { config, .. } => Ok(Box::new(WebSource::new(config.clone())?)),
        #[cfg(not(feature = "web"))]
        SourceMetadata::Web { .. } => Err(IndexError::config("web source support not compiled in")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_core::model::LocalFsConfig;

    #[test]
    fn builds_localfs_from_metadata() {
        let meta = SourceMetadata::LocalFs {
            config: LocalFsConfig { root_path: "/tmp".to_string(), ignore_patterns: None },
            synced_at: SourceMetadata::now_iso8601(),
        };
        assert!(build_source(&meta).is_ok());
    }
}
