//! Ingestion utilities for turning live web pages into index-ready chunks.
//!
//! The helpers in this module provide four capabilities:
//!
//! * [`fetch`] — same-site crawling that yields one [`fetch::Document`] per
//!   distinct page, collecting per-page failures instead of aborting.
//! * [`chunk`] — deterministic fixed-size overlapping character chunking.
//! * [`cache`] — disk-backed caching for downloaded pages.
//! * [`resume`] — state tracking so interrupted ingest jobs can resume.

pub mod cache;
pub mod chunk;
pub mod fetch;
pub mod resume;

pub use cache::DocumentCache;
pub use chunk::{Chunk, split_document};
pub use fetch::{Document, FetchFailure, FetchReport, HttpFetcher, SourceFetcher};
pub use resume::ResumeTracker;
