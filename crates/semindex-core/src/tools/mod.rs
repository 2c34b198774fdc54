//! Tool contracts exposed to RPC/CLI callers:
//! `search`, `list_files`, `read_file`. These are thin, stateless
//! wrappers around a `ContextEngine`/`Source` pair; the RPC and CLI
//! layers own lifetime and selection of which engine/source to pass.

pub mod pattern;

use crate::engine::ContextEngine;
use crate::errors::IndexError;
use crate::model::{FileInfo, FileKind};
use crate::source::{ReadOptions, Source};
use pattern::Pattern;

const DEFAULT_LIST_DEPTH: u32 = 2;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub max_output_length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutput {
    pub results: String,
    pub query: String,
}

pub async fn search(
    ctx: &mut dyn ContextEngine,
    query: &str,
    opts: SearchOptions,
) -> Result<SearchOutput, IndexError> {
    let results = ctx.search(query, opts.max_output_length).await?;
    Ok(SearchOutput { results, query: query.to_string() })
}

#[derive(Debug, Clone, Default)]
pub struct ListFilesOptions {
    pub directory: Option<String>,
    pub pattern: Option<String>,
    pub depth: Option<u32>,
    pub show_hidden: bool,
}

/// Lists files under `opts.directory` to `opts.depth` (default 2),
/// filtering the basename against `opts.pattern` (glob-style) and
/// skipping dotfiles unless `show_hidden` is set. `Source::list_files`
/// is non-recursive, so depth is walked here one directory at a time.
pub async fn list_files(
    source: Option<&mut dyn Source>,
    opts: ListFilesOptions,
) -> Result<Vec<FileInfo>, IndexError> {
    let source = source.ok_or_else(|| IndexError::SearchOnlyDenied("list_files".to_string()))?;
    let depth = opts.depth.unwrap_or(DEFAULT_LIST_DEPTH);

    let mut out = Vec::new();
    let mut stack = vec![(opts.directory.clone(), 0u32)];

    while let Some((dir, level)) = stack.pop() {
        let entries = source.list_files(dir.as_deref()).await?;
        for entry in entries {
            let basename = entry.path.rsplit('/').next().unwrap_or(&entry.path).to_string();
            if !opts.show_hidden && basename.starts_with('.') {
                continue;
            }

            let is_dir = entry.kind == FileKind::Directory;
            let recurse_path = entry.path.clone();
            let matches = opts.pattern.as_deref().map(|p| glob_match(p, &basename)).unwrap_or(true);
            if matches {
                out.push(entry);
            }
            if is_dir && level + 1 < depth {
                stack.push((Some(recurse_path), level + 1));
            }
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

/// Matches `text` against a glob `pattern` (`*` = any run, `?` = one
/// char, everything else literal). Used for basename filtering only,
/// never for file contents.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[char], t: &[char]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some('*') => rec(&p[1..], t) || (!t.is_empty() && rec(p, &t[1..])),
            Some('?') => !t.is_empty() && rec(&p[1..], &t[1..]),
            Some(c) => !t.is_empty() && t[0] == *c && rec(&p[1..], &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    rec(&p, &t)
}

#[derive(Debug, Clone, Default)]
pub struct ReadFileOptions {
    pub start_line: Option<u32>,
    pub end_line: Option<i64>,
    pub search_pattern: Option<String>,
    pub context_lines_before: Option<u32>,
    pub context_lines_after: Option<u32>,
    pub include_line_numbers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReadFileOutput {
    pub contents: Option<String>,
    pub error: Option<String>,
    pub suggestions: Option<Vec<String>>,
}

/// Reads a line range (1-based inclusive, `endLine = -1` or any
/// non-positive value meaning end-of-file) from `path`, optionally
/// restricted to lines matching `searchPattern` plus surrounding
/// context, with elided regions rendered as a single `...` line.
pub async fn read_file(
    source: Option<&mut dyn Source>,
    path: &str,
    opts: ReadFileOptions,
) -> Result<ReadFileOutput, IndexError> {
    let source = source.ok_or_else(|| IndexError::SearchOnlyDenied("read_file".to_string()))?;

    let pattern = opts.search_pattern.as_deref().map(Pattern::compile).transpose()?;

    let read_opts = ReadOptions {
        start_line: opts.start_line,
        end_line: opts.end_line,
        search_pattern: opts.search_pattern.clone(),
    };

    let bytes = match source.read_file(path, &read_opts).await? {
        Some(b) => b,
        None => {
            return Ok(ReadFileOutput {
                contents: None,
                error: Some(format!("file not found: {path}")),
                suggestions: None,
            });
        }
    };

    let text = match std::str::from_utf8(&bytes) {
        Ok(t) => t,
        Err(_) => {
            return Ok(ReadFileOutput {
                contents: None,
                error: Some(format!("file is not valid utf-8: {path}")),
                suggestions: None,
            });
        }
    };

    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();

    let start = opts.start_line.unwrap_or(1).max(1) as usize;
    let end = match opts.end_line {
        None => total,
        Some(n) if n <= 0 => total,
        Some(n) => (n as usize).min(total),
    };

    if total == 0 || start > total || start > end {
        return Ok(ReadFileOutput { contents: Some(String::new()), error: None, suggestions: None });
    }

    let selected: Vec<(usize, &str)> = (start..=end).filter_map(|i| lines.get(i - 1).map(|l| (i, *l))).collect();

    let rendered = match pattern {
        None => render_lines(&selected, opts.include_line_numbers),
        Some(pattern) => {
            let before = opts.context_lines_before.unwrap_or(0) as usize;
            let after = opts.context_lines_after.unwrap_or(0) as usize;
            render_matches(&selected, &pattern, before, after, opts.include_line_numbers)
        }
    };

    Ok(ReadFileOutput { contents: Some(rendered), error: None, suggestions: None })
}

fn render_lines(selected: &[(usize, &str)], numbered: bool) -> String {
    selected
        .iter()
        .map(|(n, l)| if numbered { format!("{n}: {l}") } else { (*l).to_string() })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_matches(selected: &[(usize, &str)], pattern: &Pattern, before: usize, after: usize, numbered: bool) -> String {
    let n = selected.len();
    let mut keep = vec![false; n];
    for (i, (_, line)) in selected.iter().enumerate() {
        if pattern.is_match(line) {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n.saturating_sub(1));
            keep[lo..=hi].iter_mut().for_each(|k| *k = true);
        }
    }

    let mut out = Vec::new();
    let mut pending_gap = false;
    for (i, (ln, l)) in selected.iter().enumerate() {
        if keep[i] {
            if pending_gap {
                out.push("...".to_string());
                pending_gap = false;
            }
            out.push(if numbered { format!("{ln}: {l}") } else { (*l).to_string() });
        } else {
            pending_gap = true;
        }
    }
    if pending_gap && !out.is_empty() {
        out.push("...".to_string());
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryContextEngine;
    use crate::model::FileEntry;
    use async_trait::async_trait;

    #[tokio::test]
    async fn search_delegates_to_engine() {
        let mut engine = InMemoryContextEngine::new();
        engine.add_to_index(&[FileEntry::new("a.rs", "fn main() {}")]).await.unwrap();
        let out = search(&mut engine, "main", SearchOptions::default()).await.unwrap();
        assert_eq!(out.query, "main");
        assert_eq!(out.results, "a.rs");
    }

    struct FakeTree {
        files: Vec<(&'static str, FileKind)>,
    }

    #[async_trait]
    impl Source for FakeTree {
        async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
            Ok(vec![])
        }

        async fn fetch_changes(
            &mut self,
            _previous: &crate::model::SourceMetadata,
        ) -> Result<Option<crate::model::FileChanges>, IndexError> {
            Ok(None)
        }

        async fn get_metadata(&mut self) -> Result<crate::model::SourceMetadata, IndexError> {
            unimplemented!()
        }

        async fn list_files(&mut self, directory: Option<&str>) -> Result<Vec<FileInfo>, IndexError> {
            let prefix = directory.map(|d| format!("{d}/")).unwrap_or_default();
            Ok(self
                .files
                .iter()
                .filter(|(path, _)| {
                    let rest = path.strip_prefix(&prefix as &str);
                    matches!(rest, Some(r) if !r.is_empty() && !r.contains('/'))
                })
                .map(|(path, kind)| FileInfo { path: path.to_string(), kind: *kind })
                .collect())
        }

        async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
            if path == "README.md" {
                Ok(Some(b"line one\nline two\nline three\n".to_vec()))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn list_files_without_source_is_denied() {
        let err = list_files(None, ListFilesOptions::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::SearchOnlyDenied(_)));
    }

    #[tokio::test]
    async fn list_files_respects_pattern_and_hidden() {
        let mut src = FakeTree {
            files: vec![
                ("a.rs", FileKind::File),
                ("b.md", FileKind::File),
                (".hidden", FileKind::File),
                ("src", FileKind::Directory),
                ("src/lib.rs", FileKind::File),
            ],
        };
        let out = list_files(
            Some(&mut src),
            ListFilesOptions { pattern: Some("*.rs".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
        let paths: Vec<&str> = out.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "src/lib.rs"]);
    }

    #[tokio::test]
    async fn read_file_line_range() {
        let mut src = FakeTree { files: vec![] };
        let out = read_file(
            Some(&mut src),
            "README.md",
            ReadFileOptions { start_line: Some(2), end_line: Some(-1), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(out.contents.unwrap(), "line two\nline three");
    }

    #[tokio::test]
    async fn read_file_search_pattern_elides_non_matching_runs() {
        let mut src = FakeTree { files: vec![] };
        let out = read_file(
            Some(&mut src),
            "README.md",
            ReadFileOptions { search_pattern: Some("one".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(out.contents.unwrap(), "line one\n...");
    }

    #[tokio::test]
    async fn read_file_missing_path_reports_error_not_panic() {
        let mut src = FakeTree { files: vec![] };
        let out = read_file(Some(&mut src), "missing.txt", ReadFileOptions::default()).await.unwrap();
        assert!(out.contents.is_none());
        assert!(out.error.is_some());
    }

    #[tokio::test]
    async fn read_file_rejects_unsupported_regex() {
        let mut src = FakeTree { files: vec![] };
        let err = read_file(
            Some(&mut src),
            "README.md",
            ReadFileOptions { search_pattern: Some(r"\d+".to_string()), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }
}
