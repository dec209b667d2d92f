//! Marker strategy implementations (stage 2).

use crate::txt_splitt::protocols::MarkerStrategy;
use crate::txt_splitt::types::{MarkedText, Sentence};

/// Formats sentences with `{N}` bracket markers, one per line.
pub struct BracketMarker;

impl MarkerStrategy for BracketMarker {
    fn mark(&self, text: &str, sentences: &[Sentence]) -> MarkedText {
        let mut rows: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        if rows.is_empty() && !text.trim().is_empty() {
            rows.push(text);
        }

        let formatted: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| format!("{{{i}}} {row}"))
            .collect();

        MarkedText {
            tagged_text: formatted.join("\n"),
            sentence_count: rows.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_each_sentence_with_its_index() {
        let sentences = vec![
            Sentence { index: 0, start: 0, end: 1, text: "A.".into() },
            Sentence { index: 1, start: 2, end: 3, text: "B.".into() },
        ];
        let marked = BracketMarker.mark("A. B.", &sentences);
        assert_eq!(marked.tagged_text, "{0} A.\n{1} B.");
        assert_eq!(marked.sentence_count, 2);
    }

    #[test]
    fn falls_back_to_whole_text_when_no_sentences() {
        let marked = BracketMarker.mark("only text", &[]);
        assert_eq!(marked.tagged_text, "{0} only text");
        assert_eq!(marked.sentence_count, 1);
    }

    #[test]
    fn blank_text_with_no_sentences_yields_empty_marker() {
        let marked = BracketMarker.mark("   ", &[]);
        assert_eq!(marked.tagged_text, "");
        assert_eq!(marked.sentence_count, 0);
    }
}
