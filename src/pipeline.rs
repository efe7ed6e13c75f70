//! Pipeline orchestration: the ingest phase machine and the query flow.
//!
//! ```text
//! ingest:  Pending → Fetching → Chunking → Embedding → Indexing → Done
//!                        │          │          │           │
//!                        └──────────┴──────────┴───────────┴──► Failed
//!
//! query:   embed question → search index → policy check → generate answer
//! ```
//!
//! A single page failing to fetch only downgrades that page; the job as a
//! whole fails when no page at all could be fetched, or when an
//! embedding/index call fails outright. The query flow is stateless per
//! request and returns no partial answer on failure.
//!
//! Both flows are plain futures: dropping them cancels the in-flight
//! provider call, and because upserts are per-record atomic, cancellation
//! never leaves a half-written record behind.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{NoContextPolicy, RagConfig};
use crate::embeddings::EmbeddingProvider;
use crate::generation::{Answer, AnswerGenerator};
use crate::ingestion::chunk::{Chunk, split_document};
use crate::ingestion::fetch::{Document, FetchFailure, SourceFetcher};
use crate::ingestion::resume::ResumeTracker;
use crate::stores::{EmbeddedRecord, UpsertFailure, VectorIndex};
use crate::types::RagError;

/// Phases of an ingest job, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestPhase {
    Pending,
    Fetching,
    Chunking,
    Embedding,
    Indexing,
    Done,
    Failed,
}

impl IngestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestPhase::Pending => "pending",
            IngestPhase::Fetching => "fetching",
            IngestPhase::Chunking => "chunking",
            IngestPhase::Embedding => "embedding",
            IngestPhase::Indexing => "indexing",
            IngestPhase::Done => "done",
            IngestPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accounting for one ingest job.
#[derive(Debug)]
pub struct IngestReport {
    pub job_id: Uuid,
    pub phase: IngestPhase,
    pub pages_fetched: usize,
    /// Pages skipped because a resume tracker already recorded them.
    pub pages_skipped: usize,
    pub chunks_indexed: usize,
    /// Pages that failed to fetch. Non-empty reports can still be `Done`.
    pub failed_urls: Vec<FetchFailure>,
    /// Records the index rejected.
    pub failed_records: Vec<UpsertFailure>,
}

impl IngestReport {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            phase: IngestPhase::Pending,
            pages_fetched: 0,
            pages_skipped: 0,
            chunks_indexed: 0,
            failed_urls: Vec::new(),
            failed_records: Vec::new(),
        }
    }
}

/// The orchestrator: capability traits plus explicit configuration.
pub struct RagPipeline {
    fetcher: Arc<dyn SourceFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn AnswerGenerator>,
    config: RagConfig,
    resume: Option<ResumeTracker>,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Runs the full ingest flow for the given seed URLs.
    ///
    /// Per-page fetch failures are reported in the result, not raised;
    /// the job itself fails only when nothing could be fetched or when a
    /// downstream component fails outright.
    ///
    /// Re-ingesting a source overwrites its records in place. When a page
    /// shrank since the last run, records beyond the new chunk count remain
    /// in the index under their old ids; call [`Self::purge_source`] first
    /// when exact replacement matters.
    pub async fn ingest(&self, seeds: &[Url]) -> Result<IngestReport, RagError> {
        self.config.validate()?;
        if seeds.is_empty() {
            return Err(RagError::Config(
                "ingest requires at least one seed URL".to_string(),
            ));
        }

        let mut report = IngestReport::new(Uuid::new_v4());
        let job_id = report.job_id;

        report.phase = IngestPhase::Fetching;
        info!(%job_id, phase = %report.phase, seeds = seeds.len(), "ingest started");
        let fetched = self
            .fetcher
            .fetch(seeds, self.config.max_depth)
            .await
            .map_err(|err| pipeline_failure("fetching", err.to_string()))?;
        report.pages_fetched = fetched.documents.len();
        report.failed_urls = fetched.failures;

        if fetched.documents.is_empty() {
            let summary = summarize_failures(&report.failed_urls);
            warn!(%job_id, phase = %IngestPhase::Failed, "ingest failed: no page could be fetched");
            return Err(pipeline_failure(
                "fetching",
                format!("no page could be fetched from {} seed(s): {summary}", seeds.len()),
            ));
        }

        // Resume filter: pages an earlier run already indexed are skipped
        // before any chunking or embedding work.
        let mut documents = Vec::with_capacity(fetched.documents.len());
        for document in fetched.documents {
            if let Some(tracker) = &self.resume {
                if tracker.contains(&document.url).await {
                    report.pages_skipped += 1;
                    continue;
                }
            }
            documents.push(document);
        }
        if documents.is_empty() {
            report.phase = IngestPhase::Done;
            info!(%job_id, skipped = report.pages_skipped, "ingest done: everything already indexed");
            return Ok(report);
        }

        report.phase = IngestPhase::Chunking;
        let mut chunked: Vec<(Document, Vec<Chunk>)> = Vec::with_capacity(documents.len());
        for document in documents {
            let chunks =
                split_document(&document, self.config.chunk_size, self.config.chunk_overlap)?;
            chunked.push((document, chunks));
        }
        let total_chunks: usize = chunked.iter().map(|(_, chunks)| chunks.len()).sum();
        info!(%job_id, phase = %report.phase, chunks = total_chunks, "documents chunked");

        if total_chunks == 0 {
            // Pages with no extractable text: nothing to embed or index.
            for (document, _) in &chunked {
                self.mark_processed(&document.url).await?;
            }
            report.phase = IngestPhase::Done;
            return Ok(report);
        }

        report.phase = IngestPhase::Embedding;
        let texts: Vec<String> = chunked
            .iter()
            .flat_map(|(_, chunks)| chunks.iter().map(|chunk| chunk.text.clone()))
            .collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::provider(
                self.embedder.name(),
                format!("embedded {} of {} chunks", vectors.len(), texts.len()),
            ));
        }
        info!(%job_id, phase = %report.phase, vectors = vectors.len(), "chunks embedded");

        report.phase = IngestPhase::Indexing;
        let mut records = Vec::with_capacity(total_chunks);
        let mut vector_iter = vectors.into_iter();
        for (document, chunks) in &chunked {
            for chunk in chunks {
                let vector = vector_iter
                    .next()
                    .ok_or_else(|| pipeline_failure("indexing", "embedding stream ran short"))?;
                records.push(EmbeddedRecord::from_chunk(chunk, vector, document.depth));
            }
        }
        let upsert = self.index.upsert(records).await?;
        report.chunks_indexed = upsert.succeeded;
        report.failed_records = upsert.failures;

        if report.chunks_indexed == 0 {
            warn!(
                %job_id,
                phase = %IngestPhase::Failed,
                failed = report.failed_records.len(),
                "ingest failed: index rejected every record"
            );
            return Err(pipeline_failure(
                "indexing",
                format!("all {} records were rejected", report.failed_records.len()),
            ));
        }

        // Mark pages processed only when every one of their records made it.
        let rejected: std::collections::HashSet<&str> = report
            .failed_records
            .iter()
            .map(|failure| failure.id.as_str())
            .collect();
        for (document, chunks) in &chunked {
            let clean = chunks
                .iter()
                .all(|chunk| !rejected.contains(chunk.record_id().as_str()));
            if clean {
                self.mark_processed(&document.url).await?;
            }
        }

        report.phase = IngestPhase::Done;
        info!(
            %job_id,
            pages = report.pages_fetched,
            chunks = report.chunks_indexed,
            failed_urls = report.failed_urls.len(),
            failed_records = report.failed_records.len(),
            "ingest done"
        );
        Ok(report)
    }

    /// Answers a question from the indexed corpus.
    ///
    /// Stateless per request: embed the question, retrieve `top_k` chunks,
    /// apply the no-context policy, generate. Any component failure fails
    /// the query; no partial answer is returned.
    pub async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        self.config.validate()?;
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Config("question must not be empty".to_string()));
        }

        let vectors = self.embedder.embed(&[question.to_string()]).await?;
        let query_vector = vectors.into_iter().next().ok_or_else(|| {
            RagError::provider(self.embedder.name(), "returned no vector for the question")
        })?;

        let hits = self.index.search(&query_vector, self.config.top_k).await?;
        if hits.is_empty() {
            return match self.config.no_context_policy {
                NoContextPolicy::Fail => Err(RagError::EmptyContext),
                NoContextPolicy::Notice => Ok(Answer::no_context_notice()),
            };
        }

        self.generator
            .generate(question, &hits, self.config.temperature)
            .await
    }

    /// Removes every indexed record for a source URL. Returns the number
    /// removed. See the stale-chunk note on [`Self::ingest`].
    pub async fn purge_source(&self, url: &Url) -> Result<usize, RagError> {
        self.index.delete_by_url(url.as_str()).await
    }

    async fn mark_processed(&self, url: &Url) -> Result<(), RagError> {
        if let Some(tracker) = &self.resume {
            tracker.mark_processed(url).await?;
        }
        Ok(())
    }
}

fn pipeline_failure(phase: &'static str, message: impl Into<String>) -> RagError {
    RagError::Pipeline {
        phase,
        message: message.into(),
    }
}

fn summarize_failures(failures: &[FetchFailure]) -> String {
    if failures.is_empty() {
        return "no failures recorded".to_string();
    }
    failures
        .iter()
        .map(|failure| format!("{} ({})", failure.url, failure.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builder for [`RagPipeline`]. The four capability components are
/// required; configuration defaults to [`RagConfig::default`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    fetcher: Option<Arc<dyn SourceFetcher>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    config: Option<RagConfig>,
    resume: Option<ResumeTracker>,
}

impl RagPipelineBuilder {
    #[must_use]
    pub fn fetcher(mut self, fetcher: impl SourceFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: impl EmbeddingProvider + 'static) -> Self {
        self.embedder = Some(Arc::new(embedder));
        self
    }

    #[must_use]
    pub fn index(mut self, index: impl VectorIndex + 'static) -> Self {
        self.index = Some(Arc::new(index));
        self
    }

    #[must_use]
    pub fn index_arc(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn generator(mut self, generator: impl AnswerGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    #[must_use]
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn resume_tracker(mut self, tracker: ResumeTracker) -> Self {
        self.resume = Some(tracker);
        self
    }

    /// Builds the pipeline, validating the configuration up front.
    pub fn build(self) -> Result<RagPipeline, RagError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(RagPipeline {
            fetcher: self
                .fetcher
                .ok_or_else(|| RagError::Config("pipeline requires a fetcher".to_string()))?,
            embedder: self
                .embedder
                .ok_or_else(|| RagError::Config("pipeline requires an embedder".to_string()))?,
            index: self
                .index
                .ok_or_else(|| RagError::Config("pipeline requires a vector index".to_string()))?,
            generator: self
                .generator
                .ok_or_else(|| RagError::Config("pipeline requires a generator".to_string()))?,
            config,
            resume: self.resume,
        })
    }
}
