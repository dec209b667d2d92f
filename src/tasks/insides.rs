//! Insides extraction (C15): flags sentences that are key takeaways,
//! personal anecdotes, or otherwise unusually insightful (`spec.md` §4.15,
//! grounded in `lib/tasks/insides.py`'s `INSIDES_PROMPT_TEMPLATE` /
//! `parse_llm_response`).
//!
//! The original marks individual *words* with `|#N#|` markers and tracks
//! paragraph boundaries from the legacy HTML splitter. This pipeline's
//! sentence splitter doesn't carry paragraph boundaries through, so ranges
//! are expressed over the same 1-based sentence numbering every other
//! derived task already uses, and `paragraph_index` is reported as `0`
//! uniformly (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::store::submissions::SubmissionStore;
use crate::tasks::cached_call;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::types::Sentence;

const TEMPERATURE: f32 = 0.1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsideEntry {
    pub text: String,
    pub is_inside: bool,
    pub paragraph_index: usize,
}

fn build_prompt(numbered_sentences: &str) -> String {
    format!(
        "You are given numbered sentences from a document.\n\n\
Your task is to identify and extract \"insides\" from the text.\n\
\"Insides\" are sentences or segments that:\n\
- Are very important or key takeaways.\n\
- Contain a story about the author's personal experience.\n\
- Provide unusual or insightful information.\n\
- Capture unique perspectives or \"aha!\" moments.\n\n\
Specify the boundaries of these \"insides\" using the sentence numbers from the text.\n\n\
Output format (one range per line):\n\
start-end\n\n\
Example:\n\
10-12\n\
20-20\n\n\
Important instructions:\n\
- Use the exact sentence numbers as provided.\n\
- Each range is start-end (inclusive).\n\
- Only extract segments that qualify as \"insides\". Do not cover the entire text if most of it is not insightful.\n\
- If no insides are found, return an empty response.\n\n\
<content>\n{numbered_sentences}\n</content>"
    )
}

fn parse_ranges(response: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    for line in response.trim().lines() {
        let line = line.trim();
        if !line.contains('-') {
            continue;
        }
        let parts: Vec<&str> = line.split('-').collect();
        if parts.len() != 2 {
            continue;
        }
        let (p1, p2) = (parts[0].trim(), parts[1].trim());
        if let (Ok(start), Ok(end)) = (p1.parse(), p2.parse()) {
            ranges.push((start, end));
        }
    }
    ranges
}

fn is_covered(sentence_number: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(start, end)| sentence_number >= start && sentence_number <= end)
}

pub async fn process(pool: &SqlitePool, llm: Arc<dyn LlmCallable>, submission_id: &str) -> anyhow::Result<()> {
    let submission = SubmissionStore::get_by_id(pool, submission_id)
        .await?
        .ok_or_else(|| anyhow!("submission {submission_id} not found"))?;

    let sentences: Vec<Sentence> = submission.results.get("sentences").unwrap_or_default();
    if sentences.is_empty() {
        anyhow::bail!("split/topic generation must be completed first");
    }

    let numbered = sentences.iter().enumerate().map(|(i, s)| format!("{}. {}", i + 1, s.text)).collect::<Vec<_>>().join("\n");
    let prompt = build_prompt(&numbered);
    let response = cached_call(pool, &llm, &prompt, TEMPERATURE).await?;
    let ranges = parse_ranges(&response);

    let insides: Vec<InsideEntry> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| InsideEntry { text: s.text.clone(), is_inside: is_covered(i + 1, &ranges), paragraph_index: 0 })
        .collect();

    let mut partial = HashMap::new();
    partial.insert("insides".to_string(), serde_json::to_value(&insides)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ranges_and_skips_noise() {
        let response = "10-12\nbogus\n20-20\n";
        let ranges = parse_ranges(response);
        assert_eq!(ranges, vec![(10, 12), (20, 20)]);
    }

    #[test]
    fn covered_checks_inclusive_bounds() {
        let ranges = vec![(5, 8)];
        assert!(is_covered(5, &ranges));
        assert!(is_covered(8, &ranges));
        assert!(!is_covered(9, &ranges));
    }

    #[test]
    fn empty_response_yields_no_insides() {
        assert!(parse_ranges("").is_empty());
    }
}
