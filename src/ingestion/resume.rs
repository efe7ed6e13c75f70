//! Resume tracking for long-running ingest jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use url::Url;

use crate::types::RagError;

/// Persisted set of already-indexed page URLs.
///
/// The pipeline consults the tracker after fetching and marks a page only
/// once its records are safely in the index, so a crash between the two
/// re-processes the page rather than losing it.
#[derive(Clone, Debug)]
pub struct ResumeTracker {
    path: PathBuf,
    processed: Arc<Mutex<HashSet<String>>>,
}

impl ResumeTracker {
    /// Creates a tracker persisting to `path`, loading prior state if the
    /// file exists.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RagError> {
        let path = path.into();
        let mut processed = HashSet::new();
        if path.exists() {
            let data = fs::read_to_string(&path).await?;
            let urls: Vec<String> = serde_json::from_str(&data)
                .map_err(|err| RagError::Config(format!("corrupt resume state: {err}")))?;
            processed.extend(urls);
        }
        Ok(Self {
            path,
            processed: Arc::new(Mutex::new(processed)),
        })
    }

    /// Where the tracker persists its state.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` when the page was already indexed by an earlier run.
    pub async fn contains(&self, url: &Url) -> bool {
        let guard = self.processed.lock().await;
        guard.contains(url.as_str())
    }

    /// Number of pages recorded as processed.
    pub async fn len(&self) -> usize {
        let guard = self.processed.lock().await;
        guard.len()
    }

    /// Records a page as indexed and persists the updated state.
    pub async fn mark_processed(&self, url: &Url) -> Result<(), RagError> {
        let mut guard = self.processed.lock().await;
        let inserted = guard.insert(url.as_str().to_string());
        if !inserted && self.path.exists() {
            return Ok(());
        }
        let urls: Vec<String> = guard.iter().cloned().collect();
        drop(guard);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let serialized = serde_json::to_string(&urls)
            .map_err(|err| RagError::Config(format!("resume state serialization: {err}")))?;
        fs::write(&self.path, serialized).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tracker_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let tracker = ResumeTracker::load(&path).await.unwrap();
        let url = Url::parse("https://example.com/page").unwrap();
        assert!(!tracker.contains(&url).await);

        tracker.mark_processed(&url).await.unwrap();
        assert!(tracker.contains(&url).await);
        assert_eq!(tracker.len().await, 1);

        let reloaded = ResumeTracker::load(&path).await.unwrap();
        assert!(reloaded.contains(&url).await);
    }

    #[tokio::test]
    async fn marking_twice_is_harmless() {
        let dir = tempdir().unwrap();
        let tracker = ResumeTracker::load(dir.path().join("state.json"))
            .await
            .unwrap();
        let url = Url::parse("https://example.com/page").unwrap();
        tracker.mark_processed(&url).await.unwrap();
        tracker.mark_processed(&url).await.unwrap();
        assert_eq!(tracker.len().await, 1);
    }
}
