//! Trait definitions for the pipeline stages.
//!
//! Each trait is the Rust counterpart of one Python `Protocol` in the
//! original implementation: a small, pure interface that every concrete
//! strategy implements, and that [`crate::txt_splitt::pipeline::Pipeline`]
//! is generic (via trait objects) over.

use crate::error::Result;
use crate::txt_splitt::types::{MarkedText, Sentence, SentenceGroup};

/// Stage 1: split raw text into sentences.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<Sentence>;
}

/// Stage 2: apply markers to sentences, producing tagged text.
pub trait MarkerStrategy: Send + Sync {
    fn mark(&self, text: &str, sentences: &[Sentence]) -> MarkedText;
}

/// Stage 3: query an LLM with marked text.
pub trait LlmStrategy: Send + Sync {
    fn query(&self, marked_text: &MarkedText) -> Result<String>;
}

/// Stage 4: parse a raw LLM response into sentence groups.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, response: &str, sentence_count: usize) -> Result<Vec<SentenceGroup>>;
}

/// Stage 5: validate and repair gaps in sentence coverage.
pub trait GapHandler: Send + Sync {
    fn handle(
        &self,
        groups: Vec<SentenceGroup>,
        sentence_count: usize,
        sentences: Option<&[Sentence]>,
    ) -> Result<Vec<SentenceGroup>>;
}

/// Optional: split `MarkedText` into smaller chunks for LLM querying.
pub trait MarkedTextChunker: Send + Sync {
    fn chunk(&self, marked_text: &MarkedText) -> Vec<MarkedText>;
}

/// Stage 6 (optional): refine group boundaries for short sentences.
pub trait Enhancer: Send + Sync {
    fn enhance(&self, groups: Vec<SentenceGroup>, sentences: &[Sentence]) -> Result<Vec<SentenceGroup>>;
}

/// A single prompted LLM call: `call(prompt, temperature) -> response`.
/// Implemented by the real HTTP-backed client and by mocks in tests.
pub trait LlmCallable: Send + Sync {
    fn call(&self, prompt: &str, temperature: f32) -> Result<String>;
}
