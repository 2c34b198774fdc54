//! The website crawler source.
//! Always re-crawls on `fetchChanges`; `readFile` serves from the crawl
//! cache populated by the last `fetchAll`, falling back to a targeted
//! fetch of the reconstructed URL.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use semindex_core::errors::IndexError;
use semindex_core::model::{FileChanges, FileEntry, FileInfo, FileKind, SourceMetadata, WebConfig};
use semindex_core::source::{reject_traversal, ReadOptions, Source};
use url::Url;

const DEFAULT_MAX_DEPTH: u32 = 3;
const DEFAULT_MAX_PAGES: u32 = 200;

pub struct WebSource {
    config: WebConfig,
    http: reqwest::Client,
    cache: HashMap<String, String>,
}

impl WebSource {
    pub fn new(config: WebConfig) -> Result<Self, IndexError> {
        let agent = config.user_agent.clone().unwrap_or_else(|| "semindex-crawler".to_string());
        let http = reqwest::Client::builder()
            .user_agent(agent)
            .build()
            .map_err(|e| IndexError::config(format!("building HTTP client: {e}")))?;
        Ok(Self { config, http, cache: HashMap::new() })
    }

    fn origin(&self) -> Result<Url, IndexError> {
        Url::parse(&self.config.url).map_err(|e| IndexError::config(format!("invalid start URL: {e}")))
    }

    async fn disallowed_prefixes(&self, origin: &Url) -> Vec<String> {
        if !self.config.respect_robots.unwrap_or(false) {
            return Vec::new();
        }
        let robots_url = match origin.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        };
        let body = match self.http.get(robots_url).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            _ => return Vec::new(),
        };
        parse_robots_disallow(&body, self.config.user_agent.as_deref())
    }
}

fn parse_robots_disallow(body: &str, agent: Option<&str>) -> Vec<String> {
    let mut rules = Vec::new();
    let mut applies = false;
    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.to_ascii_lowercase().strip_prefix("user-agent:").map(|_| line["user-agent:".len()..].trim()) {
            let rest = rest.trim();
            applies = rest == "*" || Some(rest) == agent;
        } else if applies {
            if let Some(rest) = line.to_ascii_lowercase().strip_prefix("disallow:").map(|_| line["disallow:".len()..].trim()) {
                let path = rest.trim();
                if !path.is_empty() {
                    rules.push(path.to_string());
                }
            }
        }
    }
    rules
}

fn is_disallowed(path: &str, disallow: &[String]) -> bool {
    disallow.iter().any(|p| path.starts_with(p.as_str()))
}

fn normalize_url(mut url: Url) -> Url {
    url.set_fragment(None);
    if url.path() != "/" && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
    url
}

fn glob_matches_any(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| path.starts_with(p.as_str()))
}

/// `/a/b` -> `a/b.md`; `/` -> `index.md`.
fn path_to_entry_name(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "index.md".to_string()
    } else {
        format!("{trimmed}.md")
    }
}

fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let strip = Selector::parse("script, style, nav, header, footer, aside").unwrap();
    let to_remove: HashSet<_> = document.select(&strip).map(|e| e.id()).collect();

    let body_selector = Selector::parse("body").unwrap();
    let root = document.select(&body_selector).next().unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    for node in root.descendants() {
        if let Some(element) = node.value().as_element() {
            if to_remove.contains(&node.id()) {
                continue;
            }
            let tag = element.name();
            if matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
                out.push('\n');
                out.push_str(&"#".repeat(tag[1..].parse().unwrap_or(1)));
                out.push(' ');
            } else if tag == "p" || tag == "li" || tag == "br" {
                out.push('\n');
            }
        } else if let Some(text) = node.value().as_text() {
            let ancestor_removed = node.ancestors().any(|a| to_remove.contains(&a.id()));
            if !ancestor_removed {
                out.push_str(text);
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").replace(" \n ", "\n").trim().to_string()
}

#[async_trait]
impl Source for WebSource {
    async fn fetch_all(&mut self) -> Result<Vec<FileEntry>, IndexError> {
        let origin = self.origin()?;
        let disallow = self.disallowed_prefixes(&origin).await;

        let max_depth = self.config.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let max_pages = self.config.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        let delay = Duration::from_millis(self.config.delay_ms.unwrap_or(0));

        let mut queue: VecDeque<(Url, u32)> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        let start = normalize_url(origin.clone());
        queue.push_back((start.clone(), 0));
        seen.insert(start.to_string());

        let mut entries = Vec::new();
        self.cache.clear();

        while let Some((url, depth)) = queue.pop_front() {
            if entries.len() as u32 >= max_pages {
                break;
            }
            if url.origin() != origin.origin() {
                continue;
            }
            if is_disallowed(url.path(), &disallow) {
                continue;
            }
            if let Some(include) = &self.config.include_paths {
                if !glob_matches_any(url.path(), include) {
                    continue;
                }
            }
            if let Some(exclude) = &self.config.exclude_paths {
                if glob_matches_any(url.path(), exclude) {
                    continue;
                }
            }

            if !delay.is_zero() && !entries.is_empty() {
                tokio::time::sleep(delay).await;
            }

            let resp = match self.http.get(url.clone()).send().await {
                Ok(r) => r,
                Err(_) => continue,
            };
            let content_type = resp.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
            if !content_type.contains("text/html") {
                continue;
            }
            let body = match resp.text().await {
                Ok(b) => b,
                Err(_) => continue,
            };

            let text = html_to_text(&body);
            let entry_path = path_to_entry_name(url.path());
            self.cache.insert(entry_path.clone(), text.clone());
            entries.push(FileEntry::new(entry_path, text));

            if depth >= max_depth {
                continue;
            }
            let document = Html::parse_document(&body);
            let anchor = Selector::parse("a[href]").unwrap();
            for el in document.select(&anchor) {
                let Some(href) = el.value().attr("href") else { continue };
                let Ok(next) = url.join(href) else { continue };
                let next = normalize_url(next);
                if next.origin() != origin.origin() {
                    continue;
                }
                let key = next.to_string();
                if seen.insert(key) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        Ok(entries)
    }

    async fn fetch_changes(&mut self, _previous: &SourceMetadata) -> Result<Option<FileChanges>, IndexError> {
        Ok(None)
    }

    async fn get_metadata(&mut self) -> Result<SourceMetadata, IndexError> {
        Ok(SourceMetadata::Web { config: self.config.clone(), synced_at: SourceMetadata::now_iso8601() })
    }

    async fn list_files(&mut self, _directory: Option<&str>) -> Result<Vec<FileInfo>, IndexError> {
        Ok(self.cache.keys().map(|p| FileInfo { path: p.clone(), kind: FileKind::File }).collect())
    }

    async fn read_file(&mut self, path: &str, _opts: &ReadOptions) -> Result<Option<Vec<u8>>, IndexError> {
        reject_traversal(path)?;
        if let Some(cached) = self.cache.get(path) {
            return Ok(Some(cached.clone().into_bytes()));
        }

        let origin = self.origin()?;
        let url_path = path.strip_suffix(".md").unwrap_or(path);
        let url_path = if url_path == "index" { "/".to_string() } else { format!("/{url_path}") };
        let Ok(target) = origin.join(&url_path) else { return Ok(None) };

        let resp = match self.http.get(target).send().await {
            Ok(r) => r,
            Err(_) => return Ok(None),
        };
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body = match resp.text().await {
            Ok(b) => b,
            Err(_) => return Ok(None),
        };
        Ok(Some(html_to_text(&body).into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_to_entry_name_handles_root() {
        assert_eq!(path_to_entry_name("/"), "index.md");
        assert_eq!(path_to_entry_name("/docs/guide"), "docs/guide.md");
    }

    #[test]
    fn robots_parses_disallow_for_wildcard_agent() {
        let body = "User-agent: *\nDisallow: /private\nDisallow: /admin\n";
        let rules = parse_robots_disallow(body, None);
        assert_eq!(rules, vec!["/private".to_string(), "/admin".to_string()]);
        assert!(is_disallowed("/private/x", &rules));
        assert!(!is_disallowed("/public", &rules));
    }

    #[test]
    fn normalize_strips_fragment_and_trailing_slash() {
        let url = Url::parse("https://example.com/docs/#section").unwrap();
        let normalized = normalize_url(url);
        assert_eq!(normalized.as_str(), "https://example.com/docs");
    }
}
