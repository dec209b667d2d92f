//! Subtopics generation (C15): per non-empty, non-"no_topic" topic, ask the
//! LLM for 2-5 sub-chapters over its sentences (`spec.md` §4.15, grounded in
//! `lib/tasks/subtopics_generation.py`'s `generate_subtopics_for_topic`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::store::models::{is_no_topic, Topic};
use crate::store::submissions::SubmissionStore;
use crate::tasks::cached_call;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::types::Sentence;

const TEMPERATURE: f32 = 0.3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subtopic {
    pub name: String,
    pub sentences: Vec<usize>,
    pub parent_topic: String,
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 ]+").unwrap());

fn build_prompt(topic_name: &str, numbered_sentences: &str) -> String {
    format!(
        "Group the following sentences into detailed sub-chapters for the topic \"{topic_name}\".\n\
- For each sub-chapter, specify which sentences belong to it.\n\
- Output format MUST be exactly:\n\
<subtopic_name>: <comma-separated sentence numbers>\n\
\n\
Important instructions:\n\
- Use the exact sentence numbers as provided (e.g., if \"15. Some text\", use 15).\n\
- Keep sub-chapters specific and meaningful.\n\
- Aim for 2-5 subtopics per chapter.\n\
- If a sentence doesn't fit, assign it to 'no_topic'.\n\
\n\
Topic: {topic_name}\n\
Sentences:\n\
{numbered_sentences}"
    )
}

fn parse_subtopics(response: &str, topic_name: &str) -> Vec<Subtopic> {
    let mut subtopics = Vec::new();
    for line in response.trim().lines() {
        let Some((name, nums_str)) = line.split_once(':') else { continue };
        let clean_name = NON_ALNUM.replace_all(name.trim(), " ").trim().to_string();
        let nums: Vec<usize> = nums_str.split(',').filter_map(|n| n.trim().parse().ok()).collect();
        if !nums.is_empty() {
            subtopics.push(Subtopic { name: clean_name, sentences: nums, parent_topic: topic_name.to_string() });
        }
    }
    subtopics
}

async fn generate_for_topic(
    pool: &SqlitePool,
    llm: &Arc<dyn LlmCallable>,
    topic: &Topic,
    sentences: &[Sentence],
) -> anyhow::Result<Vec<Subtopic>> {
    if topic.sentences.is_empty() || is_no_topic(&topic.name) {
        return Ok(Vec::new());
    }

    let numbered: Vec<String> = topic
        .sentences
        .iter()
        .filter_map(|&idx| sentences.get(idx - 1).map(|s| format!("{idx}. {}", s.text)))
        .collect();
    if numbered.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_prompt(&topic.name, &numbered.join("\n"));
    let response = cached_call(pool, llm, &prompt, TEMPERATURE).await?;
    Ok(parse_subtopics(&response, &topic.name))
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

    let mut all_subtopics = Vec::new();
    for topic in &topics {
        let subtopics = generate_for_topic(pool, &llm, topic, &sentences).await.context("subtopic generation failed")?;
        all_subtopics.extend(subtopics);
    }

    let mut partial = HashMap::new();
    partial.insert("subtopics".to_string(), serde_json::to_value(&all_subtopics)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_subtopic_lines() {
        let response = "Setup: 1,2,3\nConclusion: 5, 6\nbogus line with no colon";
        let subtopics = parse_subtopics(response, "Intro");
        assert_eq!(subtopics.len(), 2);
        assert_eq!(subtopics[0].name, "Setup");
        assert_eq!(subtopics[0].sentences, vec![1, 2, 3]);
        assert_eq!(subtopics[0].parent_topic, "Intro");
    }

    #[test]
    fn skips_lines_with_no_digits() {
        let subtopics = parse_subtopics("Empty: no, numbers, here", "Intro");
        assert!(subtopics.is_empty());
    }

    #[test]
    fn strips_non_alphanumeric_from_names() {
        let subtopics = parse_subtopics("Setup!! (part one): 1", "Intro");
        assert_eq!(subtopics[0].name, "Setup   part one");
    }
}
