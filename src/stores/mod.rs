//! Vector index clients behind the [`VectorIndex`] capability trait.
//!
//! ```text
//!                    ┌──────────────────┐
//!                    │ VectorIndex trait│
//!                    │ (upsert / search)│
//!                    └────────┬─────────┘
//!                             │
//!                  ┌──────────┴──────────┐
//!                  ▼                     ▼
//!          ┌──────────────┐      ┌──────────────┐
//!          │    SQLite    │      │   In-memory  │
//!          │  sqlite-vec  │      │ cosine scan  │
//!          └──────────────┘      └──────────────┘
//! ```
//!
//! Records carry stable ids derived from `(source_url, chunk_index)`;
//! upserting the same id overwrites the prior entry, which makes
//! re-ingestion idempotent by construction. Per-record failures travel in
//! [`UpsertReport`] so one bad record never sinks a batch silently.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ingestion::chunk::Chunk;
use crate::types::RagError;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

/// A chunk paired with its embedding, ready for persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    /// Stable identity: `{source_url}#{chunk_index}`.
    pub id: String,
    pub url: String,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
    /// Extra context (char span, crawl depth) stored as JSON.
    pub metadata: serde_json::Value,
}

impl EmbeddedRecord {
    /// Builds a record from a chunk and its embedding.
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, depth: u32) -> Self {
        Self {
            id: chunk.record_id(),
            url: chunk.source_url.to_string(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            vector,
            metadata: json!({
                "char_start": chunk.char_start,
                "char_end": chunk.char_end,
                "depth": depth,
            }),
        }
    }
}

/// One retrieval hit: chunk text plus its similarity score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub url: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// A record the index rejected, reported alongside the successes.
#[derive(Clone, Debug)]
pub struct UpsertFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of an upsert batch. Partial success is allowed; failures are
/// itemized, never swallowed.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub succeeded: usize,
    pub failures: Vec<UpsertFailure>,
}

impl UpsertReport {
    /// `true` when every record in the batch was stored.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of records the batch attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

/// Capability trait for vector storage and nearest-neighbor retrieval.
///
/// Result ordering is the backend's postcondition: `search` returns hits in
/// non-increasing score order and callers trust it rather than re-sorting.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores records, overwriting any prior entry with the same id.
    /// Each record is applied atomically; failures are itemized in the
    /// report while the rest of the batch proceeds.
    async fn upsert(&self, records: Vec<EmbeddedRecord>) -> Result<UpsertReport, RagError>;

    /// Returns up to `top_k` records most similar to `vector`, best first.
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>, RagError>;

    /// Removes every record belonging to a source URL. Returns the number
    /// removed. The caller-side remedy for stale chunks left behind when a
    /// re-ingested page shrinks.
    async fn delete_by_url(&self, url: &str) -> Result<usize, RagError>;

    /// Total records in the index.
    async fn count(&self) -> Result<usize, RagError>;
}
