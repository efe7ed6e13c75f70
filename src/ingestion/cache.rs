//! Disk-backed cache for downloaded pages.
//!
//! URLs map to deterministic sanitized file names, so repeated ingest runs
//! reuse previously downloaded pages instead of hitting the network. The
//! cache stores raw page payloads; text extraction happens downstream.

use std::path::{Path, PathBuf};

use tokio::fs;
use url::Url;

use crate::types::RagError;

#[derive(Clone, Debug)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    /// Creates a cache rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the cache file path for a URL.
    ///
    /// The host is part of the file name because a crawl may span several
    /// seed hosts whose paths collide.
    pub fn entry_path(&self, url: &Url) -> PathBuf {
        let mut components = Vec::new();
        components.push(sanitize_component(url.host_str().unwrap_or("unknown")));
        components.extend(
            url.path()
                .trim_start_matches('/')
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(sanitize_component),
        );

        let mut file_name = components.join("_");
        if let Some(query) = url.query() {
            file_name.push('_');
            file_name.push_str(&sanitize_component(query));
        }
        if Path::new(&file_name).extension().is_none() {
            file_name.push_str(".html");
        }

        self.root.join(file_name)
    }

    /// Default location for persisted ingest state (resume tracking).
    pub fn state_file(&self) -> PathBuf {
        self.root.join("ingest_state.json")
    }

    /// Loads a cached payload, or `None` when the URL was never cached.
    pub async fn load(&self, url: &Url) -> Result<Option<String>, RagError> {
        let path = self.entry_path(url);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path).await?))
    }

    /// Stores a payload for a URL, creating parent directories as needed.
    pub async fn store(&self, url: &Url, payload: &str) -> Result<PathBuf, RagError> {
        let path = self.entry_path(url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, payload).await?;
        Ok(path)
    }
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entry_path_includes_host_and_sanitizes_segments() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://example.com/docs/intro?lang=en&v=2").unwrap();
        let path = cache.entry_path(&url);
        assert!(path.ends_with("example.com_docs_intro_lang_en_v_2.html"));
    }

    #[test]
    fn root_url_maps_to_host_entry() {
        let cache = DocumentCache::new("tmp");
        let url = Url::parse("https://example.com/").unwrap();
        let path = cache.entry_path(&url);
        assert!(path.ends_with("example.com.html"));
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let url = Url::parse("https://example.com/cached/page").unwrap();

        assert!(cache.load(&url).await.unwrap().is_none());
        cache.store(&url, "<html>cached</html>").await.unwrap();
        let payload = cache.load(&url).await.unwrap();
        assert_eq!(payload.as_deref(), Some("<html>cached</html>"));
    }
}
