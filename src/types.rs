//! Error taxonomy shared across the ragloom pipeline.
//!
//! A single [`RagError`] covers every component boundary. Partial failures
//! (one bad page, one rejected record) do not travel through this type at
//! all: they are collected in [`crate::ingestion::fetch::FetchReport`] and
//! [`crate::stores::UpsertReport`] so the rest of a batch can proceed.

use thiserror::Error;
use url::Url;

/// Errors surfaced by ragloom components.
#[derive(Debug, Error)]
pub enum RagError {
    /// A single page could not be fetched. Non-fatal to a crawl: the
    /// fetcher records it and keeps going.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Invalid configuration or missing secrets. Raised before any I/O.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An embedding or LLM provider failed (auth, quota, timeout).
    /// Surfaced to the caller; retrying is the caller's decision.
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Vector index connectivity or query failure. Per-record upsert
    /// failures are reported via `UpsertReport`, not through this variant.
    #[error("vector index error: {0}")]
    Index(String),

    /// A question retrieved no context chunks and the configured policy
    /// treats that as an error.
    #[error("no relevant context was retrieved for the question")]
    EmptyContext,

    /// Job-level ingest failure, aggregated from component errors and
    /// naming the phase that failed.
    #[error("ingest failed while {phase}: {message}")]
    Pipeline {
        phase: &'static str,
        message: String,
    },

    /// A fetched document could not be parsed into usable text.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Per-page fetch failure.
    pub fn fetch(url: &Url, message: impl Into<String>) -> Self {
        RagError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Provider failure attributed to a named collaborator.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        RagError::Provider {
            provider,
            message: message.into(),
        }
    }
}
