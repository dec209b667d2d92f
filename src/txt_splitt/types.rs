//! Data types shared across every pipeline stage.

use serde::{Deserialize, Serialize};

/// A sentence extracted from source text.
///
/// `start`/`end` are half-open character offsets (`end` exclusive) in
/// whichever canonical text the current pipeline stage is working with —
/// clean text before offset restoration, original text after. `text` always
/// holds the clean sentence string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Text with `{N}` sentence markers applied, ready for an LLM prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedText {
    pub tagged_text: String,
    pub sentence_count: usize,
}

/// An inclusive range of sentence indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SentenceRange {
    pub start: usize,
    pub end: usize,
}

impl SentenceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A group of sentences sharing a hierarchical topic label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceGroup {
    pub label: Vec<String>,
    pub ranges: Vec<SentenceRange>,
}

/// Final result of the text splitting pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub sentences: Vec<Sentence>,
    pub groups: Vec<SentenceGroup>,
}

/// One non-tag text region of the original document: `length` clean
/// characters starting at `clean_offset` came from `original_offset` in the
/// source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetSegment {
    pub clean_offset: usize,
    pub original_offset: usize,
    pub length: usize,
}

/// A sorted, tiling sequence of [`OffsetSegment`]s covering `[0,
/// clean_length)`, used to translate clean-text positions back to the
/// original document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetMapping {
    pub segments: Vec<OffsetSegment>,
    pub original_length: usize,
    pub clean_length: usize,
}

impl OffsetMapping {
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            original_length: 0,
            clean_length: 0,
        }
    }

    /// Translate a clean-text offset to the corresponding original-text
    /// offset. `clean_pos == clean_length` maps to `original_length`.
    pub fn to_original(&self, clean_pos: usize) -> usize {
        if clean_pos >= self.clean_length {
            return self.original_length;
        }

        // Segments tile [0, clean_length) with strictly increasing
        // clean_offset, so the last segment starting at or before clean_pos
        // is the one that contains it.
        let idx = self
            .segments
            .partition_point(|seg| seg.clean_offset <= clean_pos)
            .saturating_sub(1);

        match self.segments.get(idx) {
            Some(seg) if clean_pos >= seg.clean_offset && clean_pos < seg.clean_offset + seg.length => {
                seg.original_offset + (clean_pos - seg.clean_offset)
            }
            // No segment covers this position (shouldn't happen for a
            // well-formed mapping); fall back to nearest segment start.
            Some(seg) => seg.original_offset,
            None => self.original_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mapping_maps_to_zero() {
        let mapping = OffsetMapping::empty();
        assert_eq!(mapping.to_original(0), 0);
    }

    #[test]
    fn round_trip_is_monotone() {
        let mapping = OffsetMapping {
            segments: vec![
                OffsetSegment { clean_offset: 0, original_offset: 3, length: 5 },
                OffsetSegment { clean_offset: 5, original_offset: 12, length: 4 },
            ],
            original_length: 20,
            clean_length: 9,
        };
        assert_eq!(mapping.to_original(0), 3);
        assert_eq!(mapping.to_original(4), 7);
        assert_eq!(mapping.to_original(5), 12);
        assert_eq!(mapping.to_original(8), 15);
        assert_eq!(mapping.to_original(9), 20);
        let mut last = mapping.to_original(0);
        for p in 1..=9 {
            let cur = mapping.to_original(p);
            assert!(cur >= last);
            last = cur;
        }
    }
}
