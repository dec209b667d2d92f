//! Enhancer implementations for refining group boundaries (SUPPLEMENT,
//! stage 6, optional).

use std::collections::HashMap;

use crate::error::{Result, SplitterError};
use crate::txt_splitt::protocols::{Enhancer, LlmCallable};
use crate::txt_splitt::types::{Sentence, SentenceGroup, SentenceRange};

const CONTEXT_SIZE: usize = 3;

enum Decision {
    Previous,
    Next,
    Ambiguous,
}

/// Reassigns short boundary sentences between adjacent groups using LLM
/// judgment: for each boundary, if the bordering sentence is shorter than
/// `min_length`, asks the LLM whether it belongs with the previous or next
/// topic.
pub struct ShortSentenceEnhancer {
    client: Box<dyn LlmCallable>,
    min_length: usize,
    temperature: f32,
}

impl ShortSentenceEnhancer {
    pub fn new(client: Box<dyn LlmCallable>, min_length: usize, temperature: f32) -> Self {
        Self { client, min_length, temperature }
    }
}

impl Enhancer for ShortSentenceEnhancer {
    fn enhance(&self, groups: Vec<SentenceGroup>, sentences: &[Sentence]) -> Result<Vec<SentenceGroup>> {
        let sentence_count = sentences.len();
        if sentence_count <= 1 || groups.len() <= 1 {
            return Ok(groups);
        }

        let mut ownership: HashMap<usize, usize> = HashMap::new();
        for (gi, group) in groups.iter().enumerate() {
            for r in &group.ranges {
                for si in r.start..=r.end {
                    ownership.insert(si, gi);
                }
            }
        }

        let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
        for i in 0..sentence_count.saturating_sub(1) {
            let gi_a = ownership[&i];
            let gi_b = ownership[&(i + 1)];
            if gi_a != gi_b {
                if sentences[i].text.len() < self.min_length {
                    candidates.push((i, gi_a, gi_b));
                }
                if sentences[i + 1].text.len() < self.min_length {
                    candidates.push((i + 1, gi_b, gi_a));
                }
            }
        }

        for (sent_idx, from_group, to_group) in candidates {
            if ownership[&sent_idx] != from_group {
                continue;
            }

            let (prev_gi, next_gi) = if sent_idx > 0 && ownership.get(&(sent_idx - 1)) == Some(&to_group) {
                (to_group, from_group)
            } else {
                (from_group, to_group)
            };

            let prev_context = gather_context(sentences, &ownership, prev_gi, sent_idx, -1);
            let next_context = gather_context(sentences, &ownership, next_gi, sent_idx, 1);

            let prompt = build_reassignment_prompt(
                &sentences[sent_idx].text,
                &groups[prev_gi].label,
                &prev_context,
                &groups[next_gi].label,
                &next_context,
            );

            let response = self
                .client
                .call(&prompt, self.temperature)
                .map_err(|e| SplitterError::Enhancer(format!("LLM call failed during enhancement: {e}")))?;

            match parse_reassignment_response(&response) {
                Decision::Previous => {
                    ownership.insert(sent_idx, prev_gi);
                }
                Decision::Next => {
                    ownership.insert(sent_idx, next_gi);
                }
                Decision::Ambiguous => {}
            }
        }

        let mut group_sentences: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
        for si in 0..sentence_count {
            group_sentences[ownership[&si]].push(si);
        }

        let mut result = Vec::new();
        for (gi, group) in groups.into_iter().enumerate() {
            let indices = &group_sentences[gi];
            if indices.is_empty() {
                continue;
            }
            result.push(SentenceGroup { label: group.label, ranges: indices_to_ranges(indices) });
        }

        Ok(result)
    }
}

fn gather_context(
    sentences: &[Sentence],
    ownership: &HashMap<usize, usize>,
    group_idx: usize,
    exclude_idx: usize,
    direction: isize,
) -> Vec<String> {
    let mut context = Vec::new();
    let mut idx = exclude_idx as isize + direction;
    while idx >= 0 && (idx as usize) < sentences.len() && context.len() < CONTEXT_SIZE {
        let u = idx as usize;
        match ownership.get(&u) {
            Some(&g) if g == group_idx => context.push(sentences[u].text.clone()),
            _ if !context.is_empty() => break,
            _ => {}
        }
        idx += direction;
    }
    if direction < 0 {
        context.reverse();
    }
    context
}

fn build_reassignment_prompt(
    sentence_text: &str,
    prev_label: &[String],
    prev_context: &[String],
    next_label: &[String],
    next_context: &[String],
) -> String {
    let prev_topic = prev_label.join(" > ");
    let next_topic = next_label.join(" > ");
    let prev_block = if prev_context.is_empty() {
        "  (no other sentences)".to_string()
    } else {
        prev_context.iter().map(|s| format!("  - {s}")).collect::<Vec<_>>().join("\n")
    };
    let next_block = if next_context.is_empty() {
        "  (no other sentences)".to_string()
    } else {
        next_context.iter().map(|s| format!("  - {s}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        "You are deciding which topic a short sentence belongs to.\n\n\
         The sentence in question:\n  \"{sentence_text}\"\n\n\
         Option A - Previous topic ({prev_topic}):\n{prev_block}\n\n\
         Option B - Next topic ({next_topic}):\n{next_block}\n\n\
         Does the sentence belong to the PREVIOUS topic or the NEXT topic?\n\
         Reply with exactly one word: PREVIOUS or NEXT"
    )
}

fn parse_reassignment_response(response: &str) -> Decision {
    let cleaned = response.trim().to_uppercase();
    let has_previous = cleaned.contains("PREVIOUS");
    let has_next = cleaned.contains("NEXT");
    if has_previous && !has_next {
        Decision::Previous
    } else if has_next && !has_previous {
        Decision::Next
    } else {
        Decision::Ambiguous
    }
}

fn indices_to_ranges(indices: &[usize]) -> Vec<SentenceRange> {
    if indices.is_empty() {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    let mut start = indices[0];
    let mut end = indices[0];
    for &idx in &indices[1..] {
        if idx == end + 1 {
            end = idx;
        } else {
            ranges.push(SentenceRange::new(start, end));
            start = idx;
            end = idx;
        }
    }
    ranges.push(SentenceRange::new(start, end));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        responses: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl LlmCallable for ScriptedLlm {
        fn call(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.get(i).copied().unwrap_or("NEXT").to_string())
        }
    }

    fn sentence(index: usize, text: &str) -> Sentence {
        Sentence { index, start: 0, end: text.len(), text: text.to_string() }
    }

    #[test]
    fn leaves_single_group_untouched() {
        let client = Box::new(ScriptedLlm { responses: vec![], calls: AtomicUsize::new(0) });
        let enhancer = ShortSentenceEnhancer::new(client, 40, 0.0);
        let groups = vec![SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] }];
        let sentences = vec![sentence(0, "short"), sentence(1, "also short")];
        let result = enhancer.enhance(groups, &sentences).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn reassigns_short_boundary_sentence_to_next_topic() {
        let client = Box::new(ScriptedLlm { responses: vec!["NEXT"], calls: AtomicUsize::new(0) });
        let enhancer = ShortSentenceEnhancer::new(client, 100, 0.0);
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(2, 2)] },
        ];
        let sentences = vec![
            sentence(0, "This is a longer first sentence that stays put."),
            sentence(1, "Hi."),
            sentence(2, "Another longer sentence here for topic B content."),
        ];
        let result = enhancer.enhance(groups, &sentences).unwrap();
        let b_group = result.iter().find(|g| g.label == vec!["B".to_string()]).unwrap();
        assert!(b_group.ranges.iter().any(|r| r.start <= 1 && r.end >= 1));
    }
}
