//! Group-joining implementations.

use crate::txt_splitt::types::{Sentence, SentenceGroup, SentenceRange};

/// Merges adjacent groups that share the same topic label and whose ranges
/// touch or overlap.
pub struct AdjacentSameTopicJoiner;

impl AdjacentSameTopicJoiner {
    pub fn join(&self, groups: Vec<SentenceGroup>, _sentences: &[Sentence]) -> Vec<SentenceGroup> {
        if groups.is_empty() {
            return Vec::new();
        }

        let mut merged: Vec<SentenceGroup> = Vec::with_capacity(groups.len());
        for group in groups {
            match merged.last() {
                Some(prev) if prev.label == group.label && touches_or_overlaps(prev, &group) => {
                    let prev = merged.last().unwrap();
                    let mut all_ranges = prev.ranges.clone();
                    all_ranges.extend(group.ranges);
                    let label = prev.label.clone();
                    *merged.last_mut().unwrap() = SentenceGroup { label, ranges: merge_ranges(all_ranges) };
                }
                _ => merged.push(group),
            }
        }
        merged
    }
}

/// Builds joined sentences from group ranges: one sentence per range, text
/// space-joined from the member sentences, with group ranges remapped to the
/// new sentence indices.
pub fn join_sentences_by_groups(
    groups: Vec<SentenceGroup>,
    sentences: &[Sentence],
) -> (Vec<Sentence>, Vec<SentenceGroup>) {
    let mut joined_sentences: Vec<Sentence> = Vec::new();
    let mut remapped_groups: Vec<SentenceGroup> = Vec::with_capacity(groups.len());

    for group in groups {
        let mut sorted_ranges = group.ranges.clone();
        sorted_ranges.sort_unstable_by_key(|r| (r.start, r.end));

        let mut remapped_ranges = Vec::with_capacity(sorted_ranges.len());
        for range in sorted_ranges {
            let joined = join_sentence_range(range, sentences, joined_sentences.len());
            let idx = joined.index;
            joined_sentences.push(joined);
            remapped_ranges.push(SentenceRange::new(idx, idx));
        }
        remapped_groups.push(SentenceGroup { label: group.label, ranges: remapped_ranges });
    }

    (joined_sentences, remapped_groups)
}

fn join_sentence_range(range: SentenceRange, sentences: &[Sentence], next_index: usize) -> Sentence {
    assert!(range.end >= range.start, "sentence range end must be >= start, got {}-{}", range.start, range.end);
    assert!(range.end < sentences.len(), "sentence range end exceeds sentence count: {} >= {}", range.end, sentences.len());

    let selected = &sentences[range.start..=range.end];
    let text = selected.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ").trim().to_string();
    Sentence { index: next_index, start: selected[0].start, end: selected[selected.len() - 1].end, text }
}

fn touches_or_overlaps(left: &SentenceGroup, right: &SentenceGroup) -> bool {
    if left.ranges.is_empty() || right.ranges.is_empty() {
        return false;
    }
    let left_end = left.ranges.iter().map(|r| r.end).max().unwrap();
    let right_start = right.ranges.iter().map(|r| r.start).min().unwrap();
    right_start <= left_end + 1
}

fn merge_ranges(ranges: Vec<SentenceRange>) -> Vec<SentenceRange> {
    if ranges.is_empty() {
        return Vec::new();
    }
    let mut ordered = ranges;
    ordered.sort_unstable_by_key(|r| (r.start, r.end));

    let mut coalesced: Vec<SentenceRange> = vec![ordered[0]];
    for current in &ordered[1..] {
        let last = coalesced.last_mut().unwrap();
        if current.start <= last.end + 1 {
            last.end = last.end.max(current.end);
        } else {
            coalesced.push(*current);
        }
    }
    coalesced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(index: usize, text: &str) -> Sentence {
        Sentence { index, start: index * 10, end: index * 10 + text.len(), text: text.to_string() }
    }

    #[test]
    fn merges_adjacent_groups_with_same_label() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] },
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(2, 3)] },
            SentenceGroup { label: vec!["B".into()], ranges: vec![SentenceRange::new(4, 4)] },
        ];
        let joined = AdjacentSameTopicJoiner.join(groups, &[]);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].ranges, vec![SentenceRange::new(0, 3)]);
    }

    #[test]
    fn does_not_merge_non_touching_same_label_groups() {
        let groups = vec![
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 1)] },
            SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(5, 6)] },
        ];
        let joined = AdjacentSameTopicJoiner.join(groups, &[]);
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn joins_sentences_within_each_range() {
        let sentences = vec![sentence(0, "One."), sentence(1, "Two."), sentence(2, "Three.")];
        let groups = vec![SentenceGroup { label: vec!["A".into()], ranges: vec![SentenceRange::new(0, 2)] }];
        let (joined, remapped) = join_sentences_by_groups(groups, &sentences);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].text, "One. Two. Three.");
        assert_eq!(remapped[0].ranges, vec![SentenceRange::new(0, 0)]);
    }
}
