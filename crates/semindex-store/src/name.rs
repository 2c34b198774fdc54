//! Name sanitization shared by every `Writer` implementation:
//! user-chosen index names are mapped to
//! storage-safe keys before touching the filesystem or an object store.

/// Replaces any character outside `[A-Za-z0-9_-]` with `_`, collapses
/// runs of underscores, and trims leading/trailing underscores.
/// Idempotent: `sanitize_name(sanitize_name(x)) == sanitize_name(x)`.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_safe_characters() {
        assert_eq!(sanitize_name("my-index_1"), "my-index_1");
    }

    #[test]
    fn replaces_and_collapses_unsafe_runs() {
        assert_eq!(sanitize_name("owner/repo name"), "owner_repo_name");
        assert_eq!(sanitize_name("a//b"), "a_b");
    }

    #[test]
    fn trims_leading_and_trailing_underscores() {
        assert_eq!(sanitize_name("/etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_name("   "), "");
    }

    #[test]
    fn is_idempotent() {
        for name in ["owner/repo", "a___b", "-leading", "plain_name"] {
            let once = sanitize_name(name);
            assert_eq!(sanitize_name(&once), once);
        }
    }
}
