//! Ingest-then-ask demonstration binary.
//!
//! Configuration comes from the environment:
//!
//! ```bash
//! RAGLOOM_URLS="https://doc.rust-lang.org/book/" \
//! RAGLOOM_QUESTION="What does the borrow checker enforce?" \
//! OPENAI_API_KEY=sk-... \
//! cargo run --bin ragloom
//! ```
//!
//! Optional: `RAGLOOM_DEPTH` (crawl depth, default 1), `RAGLOOM_DB` (sqlite
//! path, default `./ragloom.sqlite`), `RAGLOOM_CACHE` (page cache
//! directory), `RAGLOOM_RESUME=1` (skip pages indexed by earlier runs),
//! `OPENAI_BASE_URL` (any OpenAI-compatible gateway).

use std::env;
use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::FmtSubscriber;
use url::Url;

use ragloom::config::{RagConfig, Secrets};
use ragloom::embeddings::OpenAiEmbeddingProvider;
use ragloom::generation::OpenAiChatGenerator;
use ragloom::ingestion::{DocumentCache, HttpFetcher, ResumeTracker};
use ragloom::pipeline::RagPipeline;
use ragloom::stores::SqliteVectorIndex;
use ragloom::types::RagError;

#[tokio::main]
async fn main() -> Result<(), RagError> {
    init_tracing();

    let secrets = Secrets::from_env()?;

    let seeds = parse_seed_urls()?;
    let question = env::var("RAGLOOM_QUESTION").ok();

    let mut config = RagConfig::default();
    if let Ok(depth) = env::var("RAGLOOM_DEPTH") {
        let depth = depth
            .parse::<u32>()
            .map_err(|err| RagError::Config(format!("RAGLOOM_DEPTH: {err}")))?;
        config = config.with_max_depth(depth);
    }

    let db_path = env::var("RAGLOOM_DB").unwrap_or_else(|_| "./ragloom.sqlite".to_string());
    let index = SqliteVectorIndex::open(&db_path).await?;

    let mut fetcher = HttpFetcher::new(config.request_timeout)?;
    let cache = env::var("RAGLOOM_CACHE").ok().map(DocumentCache::new);
    if let Some(cache) = cache.clone() {
        fetcher = fetcher.with_cache(cache);
    }

    let embedder = OpenAiEmbeddingProvider::new(
        &secrets,
        config.embedding_model.clone(),
        config.request_timeout,
        config.max_batch,
    )?;
    let generator = OpenAiChatGenerator::new(
        &secrets,
        config.llm_model.clone(),
        config.request_timeout,
        config.max_context_chars,
    )?;

    let mut builder = RagPipeline::builder()
        .fetcher(fetcher)
        .embedder(embedder)
        .index(index)
        .generator(generator)
        .config(config);

    let resume = env::var("RAGLOOM_RESUME")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if resume {
        let state_path = cache
            .as_ref()
            .map(|cache| cache.state_file())
            .unwrap_or_else(|| PathBuf::from("./ragloom_state.json"));
        builder = builder.resume_tracker(ResumeTracker::load(state_path).await?);
    }

    let pipeline = builder.build()?;

    let report = pipeline.ingest(&seeds).await?;
    println!("Ingest {} finished ({})", report.job_id, report.phase);
    println!("  pages fetched : {}", report.pages_fetched);
    println!("  pages skipped : {}", report.pages_skipped);
    println!("  chunks indexed: {}", report.chunks_indexed);
    if !report.failed_urls.is_empty() {
        println!("  failed pages  :");
        for failure in &report.failed_urls {
            println!("    {}: {}", failure.url, failure.message);
        }
    }
    if !report.failed_records.is_empty() {
        println!("  failed records: {}", report.failed_records.len());
    }

    if let Some(question) = question {
        let answer = pipeline.answer(&question).await?;
        println!("\nQ: {question}");
        println!("A: {}", answer.text);
        if !answer.cited_chunks.is_empty() {
            println!("\nGrounded in:");
            for chunk in &answer.cited_chunks {
                println!(
                    "  {} #{} (score {:.3})",
                    chunk.url, chunk.chunk_index, chunk.score
                );
            }
        }
    }

    Ok(())
}

fn parse_seed_urls() -> Result<Vec<Url>, RagError> {
    let raw = env::var("RAGLOOM_URLS")
        .map_err(|_| RagError::Config("RAGLOOM_URLS not set (comma-separated seed URLs)".to_string()))?;
    let mut seeds = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let url = Url::parse(part)
            .map_err(|err| RagError::Config(format!("invalid seed URL '{part}': {err}")))?;
        seeds.push(url);
    }
    if seeds.is_empty() {
        return Err(RagError::Config("RAGLOOM_URLS contained no URLs".to_string()));
    }
    Ok(seeds)
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
