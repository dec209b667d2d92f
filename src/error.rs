//! Error hierarchy for the text splitter pipeline.
//!
//! Every variant here corresponds to one stage of the pipeline failing. Task
//! handlers catch this type (and any store/IO error, carried as
//! [`anyhow::Error`]) and record the `Display` string on the queue entry and
//! submission task.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitterError {
    #[error("sentence split failed: {0}")]
    SentenceSplit(String),

    #[error("marker formatting failed: {0}")]
    Marker(String),

    #[error("LLM call failed: {message}")]
    Llm {
        message: String,
        /// `Some(status)` for a non-2xx HTTP response; a `400` means the
        /// request was too large and callers may want to re-chunk.
        status: Option<u16>,
    },

    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("gap handling failed: {0}")]
    Gap(String),

    #[error("enhancer stage failed: {0}")]
    Enhancer(String),
}

impl SplitterError {
    pub fn is_request_too_large(&self) -> bool {
        matches!(self, SplitterError::Llm { status: Some(400), .. })
    }
}

pub type Result<T> = std::result::Result<T, SplitterError>;
