//! ```text
//! Seed URLs ──► ingestion::fetch (same-site crawl) ──► Documents
//!                      │                                  │
//!                      └── ingestion::cache / resume      ▼
//!                                         ingestion::chunk (overlap windows)
//!                                                          │
//!                                                          ▼
//!                              embeddings (provider batches) ──► vectors
//!                                                          │
//!                                                          ▼
//!                              stores (stable-id upsert, top-k search)
//!                                                          │
//! Question ──► embeddings ──► stores::search ──► generation ──► Answer
//! ```
//!
//! ragloom orchestrates the ingest and query flows of a web
//! retrieval-augmented-generation system. Each external collaborator
//! (crawler, embedding provider, vector index, LLM) sits behind a
//! capability trait, so concrete providers can be swapped without touching
//! the [`pipeline::RagPipeline`] orchestration.

pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use config::{NoContextPolicy, RagConfig, Secrets};
pub use generation::{Answer, AnswerGenerator};
pub use pipeline::{IngestPhase, IngestReport, RagPipeline};
pub use types::RagError;
