//! Pipeline configuration and environment-provided secrets.
//!
//! All tunables live in an explicit [`RagConfig`] threaded through the
//! pipeline builder; nothing reads ambient globals at query time, which
//! keeps the pipeline testable with fixed, injected values. Secrets are the
//! one exception: [`Secrets::from_env`] resolves them once at startup and
//! fails fast when they are missing.

use std::time::Duration;

use crate::types::RagError;

/// Policy applied when a question retrieves no context chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoContextPolicy {
    /// Surface [`RagError::EmptyContext`] to the caller.
    #[default]
    Fail,
    /// Answer with a canned "no relevant information" notice instead of
    /// calling the LLM provider with nothing to ground on.
    Notice,
}

/// Tunables for the ingest and query flows.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks. Must stay below
    /// `chunk_size`.
    pub chunk_overlap: usize,
    /// Embedding model identifier passed to the embedding provider.
    pub embedding_model: String,
    /// Chat model identifier passed to the answer generator.
    pub llm_model: String,
    /// How many link hops to follow from each seed URL.
    pub max_depth: u32,
    /// Sampling temperature for answer generation, in `[0, 1]`.
    pub temperature: f32,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Largest batch forwarded to the embedding provider in one request.
    pub max_batch: usize,
    /// Character budget for the context section of the answer prompt.
    pub max_context_chars: usize,
    /// Timeout applied to every provider HTTP call.
    pub request_timeout: Duration,
    /// What to do when retrieval comes back empty.
    pub no_context_policy: NoContextPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            chunk_overlap: 400,
            embedding_model: "text-embedding-3-large".to_string(),
            llm_model: "gpt-4-turbo-preview".to_string(),
            max_depth: 1,
            temperature: 0.7,
            top_k: 4,
            max_batch: 64,
            max_context_chars: 40_000,
            request_timeout: Duration::from_secs(30),
            no_context_policy: NoContextPolicy::default(),
        }
    }
}

impl RagConfig {
    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_no_context_policy(mut self, policy: NoContextPolicy) -> Self {
        self.no_context_policy = policy;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validates every tunable. Called by the pipeline before any I/O so a
    /// bad configuration never reaches a provider.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be within [0, 1]",
                self.temperature
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.max_batch == 0 {
            return Err(RagError::Config(
                "max_batch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Credentials for the OpenAI-compatible providers.
#[derive(Clone, Debug)]
pub struct Secrets {
    /// Bearer token sent to the embedding and chat endpoints.
    pub api_key: String,
    /// Base URL of the API, without a trailing slash. Override it to point
    /// at any OpenAI-compatible gateway.
    pub api_base: String,
}

impl Secrets {
    pub const DEFAULT_API_BASE: &'static str = "https://api.openai.com/v1";

    /// Loads secrets from the environment (and `.env`, if present).
    ///
    /// A missing `OPENAI_API_KEY` is a fatal configuration error; callers
    /// are expected to resolve secrets before constructing providers so the
    /// failure happens before any pipeline work begins.
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY not set in environment".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(RagError::Config("OPENAI_API_KEY is empty".to_string()));
        }
        let api_base = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_API_BASE.to_string());
        Ok(Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Builds secrets from explicit values, mainly for tests.
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}
