//! Answer generation behind the [`AnswerGenerator`] capability trait.
//!
//! The generator's job is narrow: take a question plus retrieved chunks and
//! produce an answer grounded only in those chunks. Prompt assembly and
//! context truncation live here so every concrete provider shares them.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::stores::RetrievedChunk;
use crate::types::RagError;

pub use openai::OpenAiChatGenerator;

/// Canned response used when retrieval comes back empty and the configured
/// policy prefers a notice over an error.
pub const NO_CONTEXT_NOTICE: &str =
    "No relevant information about this question was found in the ingested sources.";

/// A generated answer together with the chunks it was grounded in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub cited_chunks: Vec<RetrievedChunk>,
}

impl Answer {
    /// The no-context notice answer, with no citations.
    pub fn no_context_notice() -> Self {
        Self {
            text: NO_CONTEXT_NOTICE.to_string(),
            cited_chunks: Vec::new(),
        }
    }
}

/// Produces a grounded natural-language answer from retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generates an answer from `question` and `context`.
    ///
    /// Fails with [`RagError::EmptyContext`] when `context` is empty; the
    /// orchestrator's no-context policy decides whether callers ever see
    /// that state.
    async fn generate(
        &self,
        question: &str,
        context: &[RetrievedChunk],
        temperature: f32,
    ) -> Result<Answer, RagError>;
}

/// Instructions that pin the model to the supplied context.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the \
provided context. Use the pieces of context below to answer the question at the end. If you do \
not know the answer, say that you do not know; never make one up. If the question is unrelated \
to the context, politely reply that you only answer questions about the ingested content.";

/// Keeps whole chunks, best-ranked first, until the character budget runs
/// out. At least one chunk is always kept so a single oversized chunk
/// cannot starve the prompt.
pub(crate) fn select_context(
    context: &[RetrievedChunk],
    max_chars: usize,
) -> Vec<RetrievedChunk> {
    let mut selected = Vec::new();
    let mut used = 0usize;
    for chunk in context {
        let len = chunk.text.chars().count();
        if !selected.is_empty() && used + len > max_chars {
            break;
        }
        used += len;
        selected.push(chunk.clone());
    }
    selected
}

/// Renders the user-side prompt from the selected chunks.
pub(crate) fn build_user_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let rendered: Vec<String> = context
        .iter()
        .map(|chunk| format!("[source: {} #{}]\n{}", chunk.url, chunk.chunk_index, chunk.text))
        .collect();
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        rendered.join("\n\n"),
        question
    )
}
