//! Offset restoration (SUPPLEMENT): remap sentence positions from clean-text
//! to original-text coordinates after HTML cleaning.

use crate::txt_splitt::types::{OffsetMapping, Sentence, SplitResult};

/// Remaps each sentence's `start`/`end` through an [`OffsetMapping`], so
/// `original_text[s.start..s.end]` indexes into the original (pre-cleaning)
/// document. `Sentence.text` is left untouched — it always holds the clean
/// sentence string, even though its offsets now point at the original text,
/// which may include stripped HTML tags within the span.
pub struct MappingOffsetRestorer;

impl MappingOffsetRestorer {
    pub fn restore(&self, result: SplitResult, mapping: &OffsetMapping) -> SplitResult {
        if result.sentences.is_empty() {
            return result;
        }

        let restored: Vec<Sentence> = result
            .sentences
            .into_iter()
            .map(|sent| Sentence {
                index: sent.index,
                start: mapping.to_original(sent.start),
                end: mapping.to_original(sent.end),
                text: sent.text,
            })
            .collect();

        SplitResult { sentences: restored, groups: result.groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txt_splitt::types::OffsetSegment;

    #[test]
    fn restores_sentence_offsets_through_mapping() {
        let mapping = OffsetMapping {
            segments: vec![
                OffsetSegment { clean_offset: 0, original_offset: 3, length: 5 },
                OffsetSegment { clean_offset: 5, original_offset: 12, length: 4 },
            ],
            original_length: 20,
            clean_length: 9,
        };
        let result = SplitResult {
            sentences: vec![Sentence { index: 0, start: 0, end: 5, text: "hello".into() }],
            groups: Vec::new(),
        };
        let restored = MappingOffsetRestorer.restore(result, &mapping);
        assert_eq!(restored.sentences[0].start, 3);
        assert_eq!(restored.sentences[0].end, 12);
        assert_eq!(restored.sentences[0].text, "hello");
    }

    #[test]
    fn empty_sentences_are_left_untouched() {
        let result = SplitResult { sentences: Vec::new(), groups: Vec::new() };
        let restored = MappingOffsetRestorer.restore(result, &OffsetMapping::empty());
        assert!(restored.sentences.is_empty());
    }
}
