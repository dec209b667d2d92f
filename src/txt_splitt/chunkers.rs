//! Chunking strategies for splitting [`MarkedText`] into smaller pieces
//! before an LLM call (optional pipeline stage).

use crate::txt_splitt::protocols::MarkedTextChunker;
use crate::txt_splitt::types::MarkedText;

const DEFAULT_MAX_CHARS: usize = 12_000;

/// Splits `MarkedText` along line boundaries so each chunk's `tagged_text`
/// stays within `max_chars`. A single line that exceeds `max_chars` is kept
/// as its own chunk rather than split mid-line.
pub struct SizeBasedChunker {
    max_chars: usize,
}

impl SizeBasedChunker {
    pub fn new(max_chars: usize) -> Self {
        assert!(max_chars > 0, "max_chars must be positive");
        Self { max_chars }
    }
}

impl Default for SizeBasedChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl MarkedTextChunker for SizeBasedChunker {
    fn chunk(&self, marked_text: &MarkedText) -> Vec<MarkedText> {
        let tagged_text = &marked_text.tagged_text;
        if tagged_text.len() <= self.max_chars {
            return vec![marked_text.clone()];
        }

        let lines: Vec<&str> = tagged_text.split('\n').collect();
        let mut chunks = Vec::new();
        let mut current_lines: Vec<&str> = Vec::new();
        let mut current_chars = 0usize;

        for line in lines {
            let line_len = line.len();
            let added_chars = line_len + if current_lines.is_empty() { 0 } else { 1 };

            if !current_lines.is_empty() && current_chars + added_chars > self.max_chars {
                chunks.push(MarkedText {
                    tagged_text: current_lines.join("\n"),
                    sentence_count: current_lines.len(),
                });
                current_lines = vec![line];
                current_chars = line_len;
            } else {
                current_lines.push(line);
                current_chars += added_chars;
            }
        }

        if !current_lines.is_empty() {
            chunks.push(MarkedText {
                tagged_text: current_lines.join("\n"),
                sentence_count: current_lines.len(),
            });
        }

        if chunks.is_empty() {
            vec![marked_text.clone()]
        } else {
            chunks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_split() {
        let mt = MarkedText { tagged_text: "{0} hi".into(), sentence_count: 1 };
        let chunks = SizeBasedChunker::default().chunk(&mt);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn splits_long_text_on_line_boundaries() {
        let lines: Vec<String> = (0..10).map(|i| format!("{{{i}}} {}", "x".repeat(20))).collect();
        let mt = MarkedText { tagged_text: lines.join("\n"), sentence_count: 10 };
        let chunker = SizeBasedChunker::new(60);
        let chunks = chunker.chunk(&mt);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tagged_text.len() <= 60 || chunk.tagged_text.lines().count() == 1);
        }
    }

    #[test]
    fn oversized_single_line_kept_whole() {
        let mt = MarkedText { tagged_text: "x".repeat(200), sentence_count: 1 };
        let chunks = SizeBasedChunker::new(50).chunk(&mt);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tagged_text.len(), 200);
    }
}
