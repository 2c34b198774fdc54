//! The filter pipeline: decides, per candidate file, whether to admit it
//! into an index.
//!
//! Stage order is fixed and total:
//! 1. path sanitation, 2. size cap, 3. augmentignore, 4. keyish filename,
//! 5. UTF-8 round-trip, 6. gitignore (with augmentignore patterns
//! appended at lowest priority). A file passes only if every stage
//! admits it; the first stage to reject short-circuits the rest.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use once_cell_shim::OnceLazy;

use crate::model::{FileEntry, RejectReason};

/// Default per-file size cap: 1 MiB.
pub const DEFAULT_SIZE_CAP_BYTES: u64 = 1024 * 1024;

static KEYISH_RE: OnceLazy<KeyishMatcher> = OnceLazy::new(KeyishMatcher::new);

/// Outcome of running a single candidate through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Admit,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, FilterDecision::Admit)
    }
}

/// Configuration for a single pipeline run, typically built once per
/// source root.
pub struct FilterPipeline {
    size_cap_bytes: u64,
    augment_ignore: Option<Gitignore>,
    git_ignore: Option<Gitignore>,
}

impl FilterPipeline {
    /// Builds a pipeline from the raw contents of `.augmentignore` and
    /// `.gitignore` found at a source root (either may be absent).
    ///
    /// The gitignore matcher has the augmentignore patterns
    /// appended at lowest priority, so a `.gitignore`-default-bad file
    /// (e.g. a build artifact) can still be opted back in via
    /// `.augmentignore`'s negation, but never the reverse.
    pub fn new(root: &std::path::Path, augment_ignore_contents: Option<&str>, git_ignore_contents: Option<&str>) -> Self {
        let augment_ignore = augment_ignore_contents.map(|c| build_gitignore(root, c, &[]));
        let git_ignore = git_ignore_contents.map(|c| {
            let extra: Vec<&str> = augment_ignore_contents.map(|c| c.lines().collect()).unwrap_or_default();
            build_gitignore(root, c, &extra)
        });

        Self { size_cap_bytes: DEFAULT_SIZE_CAP_BYTES, augment_ignore, git_ignore }
    }

    pub fn with_size_cap(mut self, bytes: u64) -> Self {
        self.size_cap_bytes = bytes;
        self
    }

    /// Runs the six fixed stages over one candidate file's raw bytes.
    pub fn filter(&self, path: &str, bytes: &[u8]) -> FilterDecision {
        // 1. Path sanitation.
        if has_dotdot_segment(path) {
            return FilterDecision::Reject(RejectReason::PathTraversal);
        }

        // 2. Size cap.
        if bytes.len() as u64 > self.size_cap_bytes {
            return FilterDecision::Reject(RejectReason::Size);
        }

        // 3. Augment-ignore rules.
        if let Some(aug) = &self.augment_ignore {
            if matches_ignore(aug, path) {
                return FilterDecision::Reject(RejectReason::AugmentIgnore);
            }
        }

        // 4. Keyish filename rule.
        if KEYISH_RE.get().is_match(basename(path)) {
            return FilterDecision::Reject(RejectReason::Keyish);
        }

        // 5. Binary/UTF-8 rule.
        match std::str::from_utf8(bytes) {
            Ok(s) if s.as_bytes() == bytes => {}
            _ => return FilterDecision::Reject(RejectReason::Binary),
        }

        // 6. Git-ignore rules (weakest; evaluated last).
        if let Some(git) = &self.git_ignore {
            if matches_ignore(git, path) {
                return FilterDecision::Reject(RejectReason::GitIgnore);
            }
        }

        FilterDecision::Admit
    }

    /// Runs the pipeline over a whole set of candidates in one pass,
    /// producing an aggregated report.
    pub fn scan(&self, candidates: impl IntoIterator<Item = (String, Vec<u8>)>) -> crate::model::FilterReport {
        let mut report = crate::model::FilterReport::default();
        for (path, bytes) in candidates {
            match self.filter(&path, &bytes) {
                FilterDecision::Admit => {
                    // Safe: stage 5 already proved bytes round-trip through UTF-8.
                    let contents = String::from_utf8(bytes).expect("admitted bytes are valid utf-8");
                    report.admitted.push(FileEntry::new(path, contents));
                }
                FilterDecision::Reject(reason) => report.record_rejected(reason, path),
            }
        }
        report
    }
}

fn matches_ignore(matcher: &Gitignore, path: &str) -> bool {
    // We don't reliably know if `path` names a directory; matching both
    // ways means a directory-only pattern (e.g. `node_modules/`) still
    // catches files nested under it, since `matched` checks ancestors
    // are not automatically applied by the `ignore` crate per-call.
    matcher.matched(path, false).is_ignore() || matcher.matched(path, true).is_ignore()
}

fn build_gitignore(root: &std::path::Path, contents: &str, extra_lowest_priority: &[&str]) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for line in contents.lines() {
        let _ = builder.add_line(None, line);
    }
    for line in extra_lowest_priority {
        let _ = builder.add_line(None, line);
    }
    builder.build().unwrap_or_else(|_| GitignoreBuilder::new(root).build().expect("empty gitignore builds"))
}

fn has_dotdot_segment(path: &str) -> bool {
    path.split('/').any(|seg| seg == "..")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Hand-rolled matcher for the keyish-filename rule so the pipeline has
/// no runtime dependency on the general-purpose `regex` crate for a
/// fixed, known-small pattern set.
struct KeyishMatcher {
    exact: &'static [&'static str],
    suffixes: &'static [&'static str],
}

impl KeyishMatcher {
    fn new() -> Self {
        Self {
            exact: &[".git", "id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"],
            suffixes: &[".pem", ".key", ".pfx", ".p12", ".jks", ".keystore", ".pkcs12", ".crt", ".cer"],
        }
    }

    fn is_match(&self, name: &str) -> bool {
        self.exact.contains(&name) || self.suffixes.iter().any(|suf| name.ends_with(suf))
    }
}

/// Minimal lazy-once cell so `semindex-core` doesn't need to pull in
/// `once_cell`/`std::sync::OnceLock` feature gating for a single static.
mod once_cell_shim {
    use std::sync::OnceLock;

    pub struct OnceLazy<T> {
        cell: OnceLock<T>,
        init: fn() -> T,
    }

    impl<T> OnceLazy<T> {
        pub const fn new(init: fn() -> T) -> Self {
            Self { cell: OnceLock::new(), init }
        }

        pub fn get(&self) -> &T {
            self.cell.get_or_init(self.init)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> FilterPipeline {
        FilterPipeline::new(std::path::Path::new("."), None, None)
    }

    #[test]
    fn rejects_dotdot_anywhere() {
        let p = pipeline();
        assert_eq!(p.filter("../a.txt", b"x"), FilterDecision::Reject(RejectReason::PathTraversal));
        assert_eq!(p.filter("a/../b.txt", b"x"), FilterDecision::Reject(RejectReason::PathTraversal));
        assert_eq!(p.filter("a/b/..", b"x"), FilterDecision::Reject(RejectReason::PathTraversal));
    }

    #[test]
    fn size_cap_boundary() {
        let p = pipeline().with_size_cap(4);
        assert_eq!(p.filter("a.txt", b"1234"), FilterDecision::Admit);
        assert_eq!(p.filter("a.txt", b"12345"), FilterDecision::Reject(RejectReason::Size));
    }

    #[test]
    fn keyish_rejects_regardless_of_depth() {
        let p = pipeline();
        assert_eq!(p.filter("id_rsa", b"x"), FilterDecision::Reject(RejectReason::Keyish));
        assert_eq!(p.filter("deeply/nested/dir/id_rsa", b"x"), FilterDecision::Reject(RejectReason::Keyish));
        assert_eq!(p.filter("deeply/nested/server.pem", b"x"), FilterDecision::Reject(RejectReason::Keyish));
    }

    #[test]
    fn binary_rejected() {
        let p = pipeline();
        let bytes = [0x00, 0x01, 0x02, 0xFF];
        assert_eq!(p.filter("bin.dat", &bytes), FilterDecision::Reject(RejectReason::Binary));
    }

    #[test]
    fn gitignore_still_applies_when_augmentignore_is_silent() {
        let root = std::path::Path::new(".");
        let p = FilterPipeline::new(root, Some("!build.log\n"), Some("*.log\n"));
        // augmentignore negation only negates what IT matches; `build.log`
        // is not excluded by augmentignore (negation of a non-match is a
        // no-op), so gitignore's `*.log` still applies since it is weakest
        // but still in effect.
        assert_eq!(p.filter("build.log", b"ok"), FilterDecision::Reject(RejectReason::GitIgnore));
    }

    #[test]
    fn scenario_local_tree_first_full_index() {
        let root = std::path::Path::new(".");
        let p = FilterPipeline::new(root, None, Some("bin.dat\n"));
        let candidates = vec![
            ("a.txt".to_string(), b"hello".to_vec()),
            ("bin.dat".to_string(), vec![0x00, 0x01, 0x02, 0xFF]),
            ("sub/b.md".to_string(), b"x".to_vec()),
            (".gitignore".to_string(), b"bin.dat\n".to_vec()),
        ];
        let report = p.scan(candidates);
        let mut paths: Vec<_> = report.admitted.iter().map(|f| f.path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec![".gitignore".to_string(), "a.txt".to_string(), "sub/b.md".to_string()]);
        assert!(report.rejected.values().flatten().any(|p| p == "bin.dat"));
    }
}
