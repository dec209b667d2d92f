//! OpenAI-compatible chat client, narrowed from the multi-provider dispatch
//! in the teacher's `summary::llm_client` to the single endpoint shape this
//! system talks to (a local llama.cpp server).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SplitterError};
use crate::txt_splitt::protocols::LlmCallable;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

static THINKING_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think(?:ing)?>.*?</think(?:ing)?>").unwrap());

/// Strip `<think>...</think>` / `<thinking>...</thinking>` reasoning blocks
/// some local models prepend to their answer.
pub fn strip_thinking_block(raw: &str) -> String {
    THINKING_BLOCK.replace_all(raw, "").trim().to_string()
}

/// Synchronous, blocking HTTP client for an OpenAI-compatible chat
/// completions + embeddings endpoint. Blocking (rather than `async fn`) so
/// it can implement [`LlmCallable`] directly; callers run pipeline stages
/// inside `tokio::task::spawn_blocking` to avoid stalling the reactor.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    token: Option<String>,
    http: reqwest::blocking::Client,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            token,
            http: reqwest::blocking::Client::new(),
        }
    }

    fn authorize(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest { input: text, model: &self.model };

        let response = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .map_err(|e| SplitterError::Llm { message: format!("embedding request failed: {e}"), status: None })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SplitterError::Llm { message: format!("embedding API returned an error: {body}"), status: Some(status.as_u16()) });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| SplitterError::Llm { message: format!("failed to parse embedding response: {e}"), status: None })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SplitterError::Llm { message: "no embedding in response".into(), status: None })
    }
}

impl LlmCallable for HttpLlmClient {
    fn call(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            temperature,
        };

        debug!(model = %self.model, "sending chat completion request");

        let response = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .map_err(|e| SplitterError::Llm { message: format!("failed to send request to LLM: {e}"), status: None })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|_| "unknown error".to_string());
            warn!(status = status.as_u16(), "LLM API request failed");
            return Err(SplitterError::Llm { message: format!("LLM API request failed: {body}"), status: Some(status.as_u16()) });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| SplitterError::Llm { message: format!("failed to parse LLM response: {e}"), status: None })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SplitterError::Llm { message: "no content in LLM response".into(), status: None })?
            .message
            .content;

        let cleaned = strip_thinking_block(&content);
        if cleaned.is_empty() {
            return Err(SplitterError::Llm { message: "empty LLM response".into(), status: None });
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thinking_tags() {
        let raw = "<think>internal reasoning</think>\nFinal answer.";
        assert_eq!(strip_thinking_block(raw), "Final answer.");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(strip_thinking_block("Topic: 0-1"), "Topic: 0-1");
    }

    #[test]
    fn strips_thinking_variant_spelling() {
        let raw = "<thinking>deliberating</thinking>Answer";
        assert_eq!(strip_thinking_block(raw), "Answer");
    }
}
