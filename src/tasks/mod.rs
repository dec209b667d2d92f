//! Task registry (C11) and derived-artifact task handlers (C15).
//!
//! Each handler consumes a submission's accumulated `results` and appends
//! its own outputs; none mutate fields owned by another task
//! (`spec.md` §4.15).

pub mod insides;
pub mod mindmap;
pub mod prefix_tree;
pub mod registry;
pub mod split_topic_generation;
pub mod subtopics_generation;
pub mod summarization;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::store::cache::PromptCache;
use crate::txt_splitt::protocols::LlmCallable;

/// Adapts a shared `Arc<dyn LlmCallable>` (one client, cloned across
/// concurrently-running handlers/pipeline instances) to the owned
/// `Box<dyn LlmCallable>` the `txt_splitt` strategy constructors expect.
pub struct SharedLlm(pub Arc<dyn LlmCallable>);

impl LlmCallable for SharedLlm {
    fn call(&self, prompt: &str, temperature: f32) -> crate::error::Result<String> {
        self.0.call(prompt, temperature)
    }
}

/// One LLM call, transparently memoized by prompt text (C16). The
/// underlying [`LlmCallable::call`] is synchronous/blocking (it performs a
/// real network request), so it runs via `block_in_place` rather than
/// being awaited directly — this never stalls the async reactor, matching
/// the contract documented on `Cargo.toml`'s `reqwest` dependency.
pub async fn cached_call(
    pool: &SqlitePool,
    llm: &Arc<dyn LlmCallable>,
    prompt: &str,
    temperature: f32,
) -> crate::error::Result<String> {
    if let Ok(Some(cached)) = PromptCache::get(pool, prompt).await {
        return Ok(cached);
    }

    let llm = Arc::clone(llm);
    let prompt_owned = prompt.to_string();
    let response = tokio::task::block_in_place(move || llm.call(&prompt_owned, temperature))?;

    PromptCache::put(pool, prompt, &response).await;
    Ok(response)
}
