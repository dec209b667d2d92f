//! LLM client and topic-range query strategy (C6).

mod client;
mod topic_range;

pub use client::HttpLlmClient;
pub use topic_range::{build_topic_ranges_prompt, TopicRangeLlm};
