//! Gap handler implementations (stage 5): validate or repair sentence
//! coverage produced by the response parser.

use std::collections::HashMap;

use crate::error::{Result, SplitterError};
use crate::txt_splitt::protocols::{GapHandler, LlmCallable};
use crate::txt_splitt::tracer::Tracer;
use crate::txt_splitt::types::{Sentence, SentenceGroup, SentenceRange};

const CONTEXT_SIZE: usize = 3;

/// Validates that sentence groups provide continuous coverage of
/// `[0, sentence_count)`. Trims overlaps by adjusting later ranges; raises
/// on any gap or incomplete coverage rather than repairing it.
pub struct StrictGapHandler;

impl GapHandler for StrictGapHandler {
    fn handle(&self, groups: Vec<SentenceGroup>, sentence_count: usize, _sentences: Option<&[Sentence]>) -> Result<Vec<SentenceGroup>> {
        if sentence_count == 0 {
            return Err(SplitterError::Gap("sentence_count must be positive".into()));
        }
        if groups.is_empty() {
            return Err(SplitterError::Gap("No groups provided".into()));
        }

        let max_index = sentence_count - 1;
        let flat = flatten_sorted(&groups);

        let mut adjusted: Vec<Vec<SentenceRange>> = vec![Vec::new(); groups.len()];
        let mut next_expected = 0usize;

        for (gi, r) in flat {
            if r.end < next_expected {
                continue;
            }
            let start = r.start.max(next_expected);
            if start > r.end {
                continue;
            }
            if start != next_expected {
                return Err(SplitterError::Gap(format!(
                    "Gap detected: sentences {next_expected}-{} are not covered",
                    start - 1
                )));
            }
            adjusted[gi].push(SentenceRange::new(start, r.end));
            next_expected = r.end + 1;
        }

        if next_expected <= max_index {
            return Err(SplitterError::Gap(format!(
                "Incomplete coverage: sentences {next_expected}-{max_index} are not covered"
            )));
        }

        Ok(build_result(groups, adjusted))
    }
}

/// Repairs sentence groups to provide continuous coverage: trims overlaps
/// and fills gaps by extending the adjacent range forward (or the very
/// first range back to zero, or the very last range out to the end).
pub struct RepairingGapHandler;

impl GapHandler for RepairingGapHandler {
    fn handle(&self, groups: Vec<SentenceGroup>, sentence_count: usize, _sentences: Option<&[Sentence]>) -> Result<Vec<SentenceGroup>> {
        if sentence_count == 0 {
            return Err(SplitterError::Gap("sentence_count must be positive".into()));
        }
        if groups.is_empty() {
            return Err(SplitterError::Gap("No groups provided".into()));
        }

        let max_index = sentence_count - 1;
        let flat = flatten_sorted(&groups);

        let mut adjusted: Vec<Vec<SentenceRange>> = vec![Vec::new(); groups.len()];
        let mut next_expected = 0usize;
        let mut last_added: Option<(usize, usize)> = None; // (group index, index within adjusted[gi])

        for (gi, r) in flat {
            if r.end < next_expected {
                continue;
            }
            let mut start = r.start.max(next_expected);
            if start > r.end {
                continue;
            }

            if start > next_expected {
                match last_added {
                    None => start = 0,
                    Some((l_gi, l_idx)) => {
                        let prev = adjusted[l_gi][l_idx];
                        adjusted[l_gi][l_idx] = SentenceRange::new(prev.start, start - 1);
                    }
                }
            }

            adjusted[gi].push(SentenceRange::new(start, r.end));
            last_added = Some((gi, adjusted[gi].len() - 1));
            next_expected = r.end + 1;
        }

        if next_expected <= max_index {
            match last_added {
                Some((l_gi, l_idx)) => {
                    let prev = adjusted[l_gi][l_idx];
                    adjusted[l_gi][l_idx] = SentenceRange::new(prev.start, max_index);
                }
                None => return Err(SplitterError::Gap("Unable to cover end gap - no groups found".into())),
            }
        }

        Ok(build_result(groups, adjusted))
    }
}

fn flatten_sorted(groups: &[SentenceGroup]) -> Vec<(usize, SentenceRange)> {
    let mut flat: Vec<(usize, SentenceRange)> = groups
        .iter()
        .enumerate()
        .flat_map(|(gi, g)| g.ranges.iter().map(move |r| (gi, *r)))
        .collect();
    flat.sort_unstable_by_key(|(_, r)| (r.start, r.end));
    flat
}

fn build_result(groups: Vec<SentenceGroup>, adjusted: Vec<Vec<SentenceRange>>) -> Vec<SentenceGroup> {
    groups
        .into_iter()
        .zip(adjusted)
        .filter_map(|(group, ranges)| if ranges.is_empty() { None } else { Some(SentenceGroup { label: group.label, ranges }) })
        .collect()
}

/// Owner of a gap sentence: an existing group index, or a brand-new group
/// identified by its LLM-assigned label.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Owner {
    Existing(usize),
    New(Vec<String>),
}

enum GapDecision {
    Previous,
    Next,
    New(Vec<String>),
    Unknown,
}

/// Repairs gaps by asking an LLM, per uncovered sentence, whether it
/// belongs to the previous group, the next group, or a brand new topic.
pub struct LlmRepairingGapHandler {
    client: Box<dyn LlmCallable>,
    temperature: f32,
}

impl LlmRepairingGapHandler {
    pub fn new(client: Box<dyn LlmCallable>, temperature: f32) -> Self {
        Self { client, temperature }
    }

    pub fn handle_traced(
        &self,
        groups: Vec<SentenceGroup>,
        sentence_count: usize,
        sentences: Option<&[Sentence]>,
        tracer: Option<&Tracer>,
    ) -> Result<Vec<SentenceGroup>> {
        let span = tracer.map(|t| t.span("gap_handler.llm_repair"));
        if let Some(s) = &span {
            s.set("sentence_count", sentence_count);
            s.set("input_group_count", groups.len());
        }
        self.handle_inner(groups, sentence_count, sentences, tracer)
    }
}

/// Lets [`LlmRepairingGapHandler`] plug directly into [`Pipeline`](crate::txt_splitt::pipeline::Pipeline),
/// for callers that don't need the tracer-aware [`LlmRepairingGapHandler::handle_traced`] entry point.
impl GapHandler for LlmRepairingGapHandler {
    fn handle(&self, groups: Vec<SentenceGroup>, sentence_count: usize, sentences: Option<&[Sentence]>) -> Result<Vec<SentenceGroup>> {
        self.handle_inner(groups, sentence_count, sentences, None)
    }
}

impl LlmRepairingGapHandler {
    fn handle_inner(
        &self,
        groups: Vec<SentenceGroup>,
        sentence_count: usize,
        sentences: Option<&[Sentence]>,
        tracer: Option<&Tracer>,
    ) -> Result<Vec<SentenceGroup>> {
        if sentence_count == 0 {
            return Err(SplitterError::Gap("sentence_count must be positive".into()));
        }
        if groups.is_empty() {
            return Err(SplitterError::Gap("No groups provided".into()));
        }
        let sentences = sentences.ok_or_else(|| SplitterError::Gap("LlmRepairingGapHandler requires sentences context".into()))?;
        if sentences.len() != sentence_count {
            return Err(SplitterError::Gap("sentences length must match sentence_count".into()));
        }

        let max_index = sentence_count - 1;
        let flat = flatten_sorted(&groups);

        let mut ownership: HashMap<usize, Owner> = HashMap::new();
        let mut next_expected = 0usize;
        let mut last_owner: Option<usize> = None;
        let mut gaps: Vec<(usize, usize, Option<usize>, Option<usize>)> = Vec::new();

        for (gi, r) in flat {
            if r.end < next_expected {
                continue;
            }
            let start = r.start.max(next_expected);
            if start > r.end {
                continue;
            }
            if start > next_expected {
                gaps.push((next_expected, start - 1, last_owner, Some(gi)));
            }
            for si in start..=r.end {
                ownership.insert(si, Owner::Existing(gi));
            }
            last_owner = Some(gi);
            next_expected = r.end + 1;
        }
        if next_expected <= max_index {
            gaps.push((next_expected, max_index, last_owner, None));
        }

        let mut new_group_labels: Vec<Vec<String>> = Vec::new();
        let mut new_group_by_label: HashMap<Vec<String>, usize> = HashMap::new();

        for (gap_start, gap_end, prev_owner, next_owner) in gaps {
            let gap_span = tracer.map(|t| t.span("gap_handler.llm_repair.gap"));
            let _ = &gap_span;
            for sent_idx in gap_start..=gap_end {
                let owner = self.resolve_gap_sentence_owner(sentences, &ownership, sent_idx, &groups, prev_owner, next_owner, tracer)?;
                match owner {
                    Owner::New(label) => {
                        let id = *new_group_by_label.entry(label.clone()).or_insert_with(|| {
                            new_group_labels.push(label);
                            new_group_labels.len() - 1
                        });
                        ownership.insert(sent_idx, Owner::New(new_group_labels[id].clone()));
                    }
                    existing => {
                        ownership.insert(sent_idx, existing);
                    }
                }
            }
        }

        for si in 0..sentence_count {
            if !ownership.contains_key(&si) {
                return Err(SplitterError::Gap(format!("Unable to assign sentence {si}")));
            }
        }

        let mut existing_indices: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
        let mut new_indices: Vec<Vec<usize>> = vec![Vec::new(); new_group_labels.len()];
        for si in 0..sentence_count {
            match &ownership[&si] {
                Owner::Existing(gi) => existing_indices[*gi].push(si),
                Owner::New(label) => {
                    let id = new_group_by_label[label];
                    new_indices[id].push(si);
                }
            }
        }

        let mut result = Vec::new();
        for (gi, group) in groups.into_iter().enumerate() {
            let indices = &existing_indices[gi];
            if !indices.is_empty() {
                result.push(SentenceGroup { label: group.label, ranges: indices_to_ranges(indices) });
            }
        }
        for (id, label) in new_group_labels.into_iter().enumerate() {
            let indices = &new_indices[id];
            if !indices.is_empty() {
                result.push(SentenceGroup { label, ranges: indices_to_ranges(indices) });
            }
        }

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_gap_sentence_owner(
        &self,
        sentences: &[Sentence],
        ownership: &HashMap<usize, Owner>,
        sentence_index: usize,
        groups: &[SentenceGroup],
        prev_owner: Option<usize>,
        next_owner: Option<usize>,
        tracer: Option<&Tracer>,
    ) -> Result<Owner> {
        let span = tracer.map(|t| t.span("gap_handler.llm_repair.resolve_sentence"));
        if let Some(s) = &span {
            s.set("sentence_index", sentence_index);
        }

        let (prev_owner, next_owner) = match (prev_owner, next_owner) {
            (None, None) => return Err(SplitterError::Gap("Unable to resolve gap: no neighboring groups".into())),
            (None, Some(next)) => return Ok(Owner::Existing(next)),
            (Some(prev), None) => return Ok(Owner::Existing(prev)),
            (Some(prev), Some(next)) => (prev, next),
        };

        let prev_context = gather_context(sentences, ownership, &Owner::Existing(prev_owner), sentence_index, -1);
        let next_context = gather_context(sentences, ownership, &Owner::Existing(next_owner), sentence_index, 1);

        let prompt = build_gap_prompt(
            &sentences[sentence_index].text,
            &groups[prev_owner].label,
            &prev_context,
            &groups[next_owner].label,
            &next_context,
        );

        let response = self
            .client
            .call(&prompt, self.temperature)
            .map_err(|e| SplitterError::Gap(format!("LLM call failed during gap repair: {e}")))?;

        Ok(match parse_gap_response(&response) {
            GapDecision::Previous => Owner::Existing(prev_owner),
            GapDecision::Next => Owner::Existing(next_owner),
            GapDecision::New(label) => Owner::New(label),
            GapDecision::Unknown => Owner::Existing(prev_owner),
        })
    }
}

fn gather_context(sentences: &[Sentence], ownership: &HashMap<usize, Owner>, owner: &Owner, anchor_idx: usize, direction: isize) -> Vec<String> {
    let mut context = Vec::new();
    let mut idx = anchor_idx as isize + direction;
    while idx >= 0 && (idx as usize) < sentences.len() && context.len() < CONTEXT_SIZE {
        let u = idx as usize;
        match ownership.get(&u) {
            Some(o) if o == owner => context.push(sentences[u].text.clone()),
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

fn build_gap_prompt(sentence_text: &str, prev_label: &[String], prev_context: &[String], next_label: &[String], next_context: &[String]) -> String {
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
        "You are resolving a sentence gap between two neighboring topic groups.\n\n\
         Gap sentence:\n  \"{sentence_text}\"\n\n\
         Option A - Previous topic ({prev_topic}):\n{prev_block}\n\n\
         Option B - Next topic ({next_topic}):\n{next_block}\n\n\
         Decide where this sentence belongs.\n\
         Allowed answers:\n\
         PREVIOUS\n\
         NEXT\n\
         NEW: Level1 > Level2 > Topic\n\
         Reply using exactly one allowed answer."
    )
}

fn parse_gap_response(response: &str) -> GapDecision {
    let cleaned = response.trim();
    let upper = cleaned.to_uppercase();

    if upper.starts_with("PREVIOUS") {
        return GapDecision::Previous;
    }
    if upper.starts_with("NEXT") {
        return GapDecision::Next;
    }
    if upper.starts_with("NEW") {
        let topic_text = cleaned.splitn(2, ':').nth(1).unwrap_or("").trim();
        let label: Vec<String> = topic_text.split('>').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
        return GapDecision::New(if label.is_empty() { vec!["Uncategorized".to_string()] } else { label });
    }

    let has_previous = upper.contains("PREVIOUS");
    let has_next = upper.contains("NEXT");
    if has_previous && !has_next {
        GapDecision::Previous
    } else if has_next && !has_previous {
        GapDecision::Next
    } else {
        GapDecision::Unknown
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

    fn sentence(index: usize) -> Sentence {
        Sentence { index, start: index * 10, end: index * 10 + 5, text: format!("s{index}") }
    }

    #[test]
    fn strict_accepts_full_coverage() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(2, 3)] },
        ];
        let result = StrictGapHandler.handle(groups, 4, None).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn strict_rejects_gap() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(3, 3)] },
        ];
        assert!(StrictGapHandler.handle(groups, 4, None).is_err());
    }

    #[test]
    fn strict_trims_overlap() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 2)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(2, 3)] },
        ];
        let result = StrictGapHandler.handle(groups, 4, None).unwrap();
        assert_eq!(result[1].ranges, vec![SentenceRange::new(3, 3)]);
    }

    #[test]
    fn repairing_fills_leading_gap() {
        let groups = vec![SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(2, 3)] }];
        let result = RepairingGapHandler.handle(groups, 4, None).unwrap();
        assert_eq!(result[0].ranges, vec![SentenceRange::new(0, 3)]);
    }

    #[test]
    fn repairing_fills_trailing_gap() {
        let groups = vec![SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] }];
        let result = RepairingGapHandler.handle(groups, 4, None).unwrap();
        assert_eq!(result[0].ranges, vec![SentenceRange::new(0, 3)]);
    }

    #[test]
    fn repairing_fills_middle_gap_by_extending_previous() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 0)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(3, 3)] },
        ];
        let result = RepairingGapHandler.handle(groups, 4, None).unwrap();
        assert_eq!(result[0].ranges, vec![SentenceRange::new(0, 2)]);
        assert_eq!(result[1].ranges, vec![SentenceRange::new(3, 3)]);
    }

    struct ScriptedLlm(Vec<&'static str>, std::sync::atomic::AtomicUsize);
    impl LlmCallable for ScriptedLlm {
        fn call(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            let i = self.1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.0.get(i).copied().unwrap_or("PREVIOUS").to_string())
        }
    }

    #[test]
    fn llm_repair_fills_single_sentence_gap_via_previous() {
        let client = Box::new(ScriptedLlm(vec!["PREVIOUS"], std::sync::atomic::AtomicUsize::new(0)));
        let handler = LlmRepairingGapHandler::new(client, 0.0);
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 0)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(2, 2)] },
        ];
        let sentences: Vec<Sentence> = (0..3).map(sentence).collect();
        let result = handler.handle_inner(groups, 3, Some(&sentences), None).unwrap();
        let a = result.iter().find(|g| g.label == vec!["A".to_string()]).unwrap();
        assert_eq!(a.ranges, vec![SentenceRange::new(0, 1)]);
    }

    #[test]
    fn llm_repair_creates_new_group_for_unrelated_gap() {
        let client = Box::new(ScriptedLlm(vec!["NEW: Misc > Aside"], std::sync::atomic::AtomicUsize::new(0)));
        let handler = LlmRepairingGapHandler::new(client, 0.0);
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 0)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(2, 2)] },
        ];
        let sentences: Vec<Sentence> = (0..3).map(sentence).collect();
        let result = handler.handle_inner(groups, 3, Some(&sentences), None).unwrap();
        assert!(result.iter().any(|g| g.label == vec!["Misc".to_string(), "Aside".to_string()]));
    }
}
