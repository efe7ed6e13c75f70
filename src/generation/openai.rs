//! Chat-completion client for OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Secrets;
use crate::embeddings::openai::{auth_headers, provider_error};
use crate::generation::{Answer, AnswerGenerator, SYSTEM_PROMPT, build_user_prompt, select_context};
use crate::stores::RetrievedChunk;
use crate::types::RagError;

const PROVIDER: &str = "openai-chat";

/// Talks to `{api_base}/chat/completions` with the grounding prompt.
pub struct OpenAiChatGenerator {
    client: Client,
    endpoint: String,
    model: String,
    max_context_chars: usize,
}

impl OpenAiChatGenerator {
    pub fn new(
        secrets: &Secrets,
        model: impl Into<String>,
        timeout: Duration,
        max_context_chars: usize,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .default_headers(auth_headers(&secrets.api_key)?)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", secrets.api_base),
            model: model.into(),
            max_context_chars,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChatGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &[RetrievedChunk],
        temperature: f32,
    ) -> Result<Answer, RagError> {
        if context.is_empty() {
            return Err(RagError::EmptyContext);
        }

        let grounded = select_context(context, self.max_context_chars);
        let user_prompt = build_user_prompt(question, &grounded);
        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| provider_error(PROVIDER, &err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::provider(
                PROVIDER,
                format!("request failed ({status}): {body}"),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| RagError::provider(PROVIDER, format!("invalid response: {err}")))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::provider(PROVIDER, "response contained no choices"))?;

        debug!(model = %self.model, cited = grounded.len(), "answer generated");
        Ok(Answer {
            text,
            cited_chunks: grounded,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}
