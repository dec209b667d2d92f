//! Summarization (C15): one terse summary per sentence, plus a per-topic
//! roll-up by concatenation (`spec.md` §4.15, grounded in
//! `lib/tasks/summarization.py`'s `summarize_by_sentence_groups` /
//! `process_summarization`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::store::models::{is_no_topic, Topic};
use crate::store::submissions::SubmissionStore;
use crate::tasks::cached_call;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::types::Sentence;

const TEMPERATURE: f32 = 0.2;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryMapping {
    pub summary_index: usize,
    pub summary_sentence: String,
    pub source_sentences: Vec<usize>,
}

fn build_prompt(sentence: &str) -> String {
    format!(
        "Summarize the text within the <text> tags into a super brief summary (just a few words).\n\
- Keep it objective and extremely concise.\n\n\
Text:\n<text>{sentence}</text>\n\nSummary:"
    )
}

/// One summary per entry in `texts`, so N inputs always yield N (or fewer,
/// when the LLM returns nothing usable) summaries — each tagged with its
/// 1-based position in `texts`.
async fn summarize_by_sentence_groups(
    pool: &SqlitePool,
    llm: &Arc<dyn LlmCallable>,
    texts: &[&str],
) -> anyhow::Result<(Vec<String>, Vec<SummaryMapping>)> {
    let mut summaries = Vec::new();
    let mut mappings = Vec::new();

    for (idx, text) in texts.iter().enumerate() {
        let prompt = build_prompt(text);
        let response = cached_call(pool, llm, &prompt, TEMPERATURE).await?;
        let summary_text = response.trim().to_string();
        if summary_text.is_empty() {
            continue;
        }
        let summary_index = summaries.len();
        mappings.push(SummaryMapping { summary_index, summary_sentence: summary_text.clone(), source_sentences: vec![idx + 1] });
        summaries.push(summary_text);
    }

    Ok((summaries, mappings))
}

pub async fn process(pool: &SqlitePool, llm: Arc<dyn LlmCallable>, submission_id: &str) -> anyhow::Result<()> {
    let submission = SubmissionStore::get_by_id(pool, submission_id)
        .await?
        .ok_or_else(|| anyhow!("submission {submission_id} not found"))?;

    let sentences: Vec<Sentence> = submission.results.get("sentences").unwrap_or_default();
    let topics: Vec<Topic> = submission.results.get("topics").unwrap_or_default();

    if sentences.is_empty() {
        anyhow::bail!("split/topic generation must be completed first");
    }

    let all_texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
    let (summary_sentences, summary_mappings) = summarize_by_sentence_groups(pool, &llm, &all_texts).await?;

    let mut topic_summaries = HashMap::new();
    for topic in &topics {
        if topic.sentences.is_empty() || is_no_topic(&topic.name) {
            continue;
        }
        let topic_texts: Vec<&str> = topic.sentences.iter().filter_map(|&idx| sentences.get(idx - 1)).map(|s| s.text.as_str()).collect();
        if topic_texts.is_empty() {
            continue;
        }
        let (ts_summary, _) = summarize_by_sentence_groups(pool, &llm, &topic_texts).await?;
        topic_summaries.insert(topic.name.clone(), ts_summary.join(" "));
    }

    let mut partial = HashMap::new();
    partial.insert("summary".to_string(), serde_json::to_value(&summary_sentences)?);
    partial.insert("summary_mappings".to_string(), serde_json::to_value(&summary_mappings)?);
    partial.insert("topic_summaries".to_string(), serde_json::to_value(&topic_summaries)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_wraps_sentence_in_text_tags() {
        let prompt = build_prompt("The quick brown fox.");
        assert!(prompt.contains("<text>The quick brown fox.</text>"));
    }
}
