//! OS-specific default store locations: Linux `~/.local/share/<app>`, macOS `~/Library/Application
//! Support/<app>`, Windows `%LOCALAPPDATA%\<app>`, all covered by
//! `dirs::data_local_dir()`. Overridable by `SEMINDEX_STORE_PATH`.

use std::path::PathBuf;

use semindex_core::errors::IndexError;

pub const STORE_PATH_ENV: &str = "SEMINDEX_STORE_PATH";

/// Resolves the default root directory for `LocalDirStore`, honoring
/// `SEMINDEX_STORE_PATH` when set.
pub fn default_store_root(app_name: &str) -> Result<PathBuf, IndexError> {
    if let Ok(path) = std::env::var(STORE_PATH_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let base = dirs::data_local_dir()
        .ok_or_else(|| IndexError::config("could not determine a default data directory for this platform"))?;
    Ok(base.join(app_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        std::env::set_var(STORE_PATH_ENV, "/tmp/semindex-test-override");
        let root = default_store_root("semindex").unwrap();
        assert_eq!(root, PathBuf::from("/tmp/semindex-test-override"));
        std::env::remove_var(STORE_PATH_ENV);
    }

    #[test]
    fn falls_back_to_os_data_dir() {
        std::env::remove_var(STORE_PATH_ENV);
        let root = default_store_root("semindex").unwrap();
        assert!(root.ends_with("semindex"));
    }
}
