//! Durable state: submission lifecycle (C14) and prompt-response cache (C16).

pub mod cache;
pub mod models;
pub mod submissions;

pub use cache::PromptCache;
pub use models::{Submission, SubmissionResults, TaskState, TaskStatus, Topic};
pub use submissions::SubmissionStore;
