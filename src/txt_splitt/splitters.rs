//! Sentence splitting implementations (C1).
//!
//! Offsets throughout this module are UTF-8 **byte** offsets into `text`,
//! not Unicode code-point offsets as in the Python original — idiomatic for
//! Rust's `&str` slicing, and self-consistent across every stage that
//! consumes these offsets. All cut points are adjusted to the nearest
//! char boundary before slicing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::txt_splitt::html::TagSpanScanner;
use crate::txt_splitt::protocols::SentenceSplitter;
use crate::txt_splitt::types::Sentence;

// The `regex` crate has no lookaround support, so the boundary pattern is
// expressed as a capturing pattern over the punctuation + whitespace +
// uppercase sequence, and the boundary to remove is just the whitespace
// run in the middle (group 2). `\p{Lu}` covers any Unicode uppercase
// letter, including Cyrillic, matching the Python source's `[A-ZА-Я]`.
static SENTENCE_BOUNDARY_FALLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])(\s+)(\p{Lu})|(\n+)").unwrap());

static DENSE_BOUNDARY_FALLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])(\s+)(\p{Lu})|(\n+)|(\s+[·•|]\s+)").unwrap());

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

/// One matched boundary: the byte range to *remove* from the text when
/// segmenting (i.e. the whitespace/newline/separator span, never the
/// punctuation or the following uppercase letter).
struct Boundary {
    start: usize,
    end: usize,
}

fn sentence_boundaries(text: &str) -> Vec<Boundary> {
    boundaries_from(&SENTENCE_BOUNDARY_FALLBACK, text)
}

fn dense_boundaries(text: &str) -> Vec<Boundary> {
    boundaries_from(&DENSE_BOUNDARY_FALLBACK, text)
}

fn boundaries_from(pattern: &Regex, text: &str) -> Vec<Boundary> {
    let mut out = Vec::new();
    for caps in pattern.captures_iter(text) {
        if let Some(m) = caps.get(2) {
            // punctuation-whitespace-uppercase form: only the whitespace run
            // (group 2) is the boundary to cut at.
            out.push(Boundary { start: m.start(), end: m.end() });
        } else if let Some(m) = caps.get(4) {
            out.push(Boundary { start: m.start(), end: m.end() });
        } else if let Some(m) = caps.get(5) {
            out.push(Boundary { start: m.start(), end: m.end() });
        }
    }
    out
}

fn trim_whitespace(text: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    while start < end {
        let Some(ch) = text[start..end].chars().next() else { break };
        if !ch.is_whitespace() {
            break;
        }
        start += ch.len_utf8();
    }
    while end > start {
        let Some(ch) = text[start..end].chars().next_back() else { break };
        if !ch.is_whitespace() {
            break;
        }
        end -= ch.len_utf8();
    }
    (start, end)
}

/// Split text into sentences using regex boundary detection.
pub struct RegexSentenceSplitter;

impl SentenceSplitter for RegexSentenceSplitter {
    fn split(&self, text: &str) -> Vec<Sentence> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut result = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        for b in sentence_boundaries(text) {
            let (s_start, s_end) = trim_whitespace(text, start, b.start);
            if s_start < s_end {
                result.push(Sentence {
                    index,
                    start: s_start,
                    end: s_end,
                    text: text[s_start..s_end].to_string(),
                });
                index += 1;
            }
            start = b.end;
        }

        let (s_start, s_end) = trim_whitespace(text, start, text.len());
        if s_start < s_end {
            result.push(Sentence {
                index,
                start: s_start,
                end: s_end,
                text: text[s_start..s_end].to_string(),
            });
        }

        result
    }
}

/// Split text into denser marker units for topic labeling: regex boundaries
/// plus digest separators plus periodic word-count anchors. Optional
/// `html_aware` mode avoids cutting inside HTML tag spans.
pub struct DenseRegexSentenceSplitter {
    anchor_every_words: usize,
    html_aware: bool,
}

impl DenseRegexSentenceSplitter {
    pub fn new(anchor_every_words: usize, html_aware: bool) -> Self {
        assert!(anchor_every_words > 0, "anchor_every_words must be positive");
        Self { anchor_every_words, html_aware }
    }
}

impl Default for DenseRegexSentenceSplitter {
    fn default() -> Self {
        Self::new(24, false)
    }
}

impl SentenceSplitter for DenseRegexSentenceSplitter {
    fn split(&self, text: &str) -> Vec<Sentence> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let tag_spans: Vec<(usize, usize)> = if self.html_aware {
            TagSpanScanner::analyze(text).protected
        } else {
            Vec::new()
        };

        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut start = 0usize;

        for b in dense_boundaries(text) {
            if self.html_aware && boundary_overlaps_tag(b.start, b.end, &tag_spans) {
                continue;
            }
            let (s_start, s_end) = trim_whitespace(text, start, b.start);
            if s_start < s_end {
                spans.push((s_start, s_end));
            }
            start = b.end;
        }

        let (s_start, s_end) = trim_whitespace(text, start, text.len());
        if s_start < s_end {
            spans.push((s_start, s_end));
        }

        let mut anchored = Vec::new();
        for (span_start, span_end) in spans {
            anchored.extend(split_span_by_word_anchor(
                text,
                span_start,
                span_end,
                self.anchor_every_words,
                if self.html_aware { Some(&tag_spans) } else { None },
            ));
        }

        anchored
            .into_iter()
            .enumerate()
            .map(|(index, (s, e))| Sentence { index, start: s, end: e, text: text[s..e].to_string() })
            .collect()
    }
}

fn pos_inside_tag(pos: usize, tag_spans: &[(usize, usize)]) -> bool {
    // tag_spans is produced sorted by TagSpanScanner::analyze.
    match tag_spans.partition_point(|&(s, _)| s <= pos).checked_sub(1) {
        Some(idx) => pos < tag_spans[idx].1,
        None => false,
    }
}

fn boundary_overlaps_tag(b_start: usize, b_end: usize, tag_spans: &[(usize, usize)]) -> bool {
    if pos_inside_tag(b_start, tag_spans) {
        return true;
    }
    if b_end > b_start && pos_inside_tag(b_end - 1, tag_spans) {
        return true;
    }
    let idx = tag_spans.partition_point(|&(s, _)| s < b_start);
    idx < tag_spans.len() && tag_spans[idx].0 < b_end
}

fn find_whitespace_cut(
    text: &str,
    start: usize,
    end: usize,
    tag_spans: Option<&[(usize, usize)]>,
) -> Option<usize> {
    if start >= end {
        return None;
    }
    let not_in_tag = |pos: usize| tag_spans.map_or(true, |spans| !pos_inside_tag(pos, spans));

    for (offset, ch) in text[start..end].char_indices() {
        let pos = start + offset;
        if ch.is_whitespace() && not_in_tag(pos) {
            return Some(pos);
        }
    }

    for (pos, ch) in text[..start].char_indices().rev() {
        if ch.is_whitespace() && not_in_tag(pos) {
            return Some(pos + ch.len_utf8());
        }
    }

    None
}

fn split_span_by_word_anchor(
    text: &str,
    start: usize,
    end: usize,
    anchor_every_words: usize,
    tag_spans: Option<&[(usize, usize)]>,
) -> Vec<(usize, usize)> {
    let matches: Vec<(usize, usize)> = WORD_PATTERN
        .find_iter(&text[start..end])
        .map(|m| (m.start() + start, m.end() + start))
        .filter(|(s, _)| tag_spans.map_or(true, |spans| !pos_inside_tag(*s, spans)))
        .collect();

    if matches.len() <= anchor_every_words {
        return vec![(start, end)];
    }

    let mut cut_points = Vec::new();
    let mut word_count = anchor_every_words;
    while word_count < matches.len() {
        let word_end = matches[word_count - 1].1;
        if let Some(cut) = find_whitespace_cut(text, word_end, end, tag_spans) {
            cut_points.push(cut);
        }
        word_count += anchor_every_words;
    }

    if cut_points.is_empty() {
        return vec![(start, end)];
    }

    let mut spans = Vec::new();
    let mut span_start = start;
    for cut in cut_points {
        let (s_start, s_end) = trim_whitespace(text, span_start, cut);
        if s_start < s_end {
            spans.push((s_start, s_end));
            span_start = cut;
        }
    }
    let (s_start, s_end) = trim_whitespace(text, span_start, end);
    if s_start < s_end {
        spans.push((s_start, s_end));
    }

    if spans.is_empty() {
        vec![(start, end)]
    } else {
        spans
    }
}

/// Split text into sentences using the tolerant HTML scanner for structure:
/// correctly handles comments, masks `<script>`/`<style>` bodies, and
/// optionally treats block-level elements as additional sentence
/// boundaries.
pub struct HtmlAwareSentenceSplitter {
    anchor_every_words: usize,
    block_tags_as_boundaries: bool,
}

impl HtmlAwareSentenceSplitter {
    pub fn new(anchor_every_words: usize, block_tags_as_boundaries: bool) -> Self {
        assert!(anchor_every_words > 0, "anchor_every_words must be positive");
        Self { anchor_every_words, block_tags_as_boundaries }
    }
}

impl Default for HtmlAwareSentenceSplitter {
    fn default() -> Self {
        Self::new(24, true)
    }
}

impl SentenceSplitter for HtmlAwareSentenceSplitter {
    fn split(&self, text: &str) -> Vec<Sentence> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let analysis = TagSpanScanner::analyze(text);
        let tag_spans = &analysis.protected;

        let mut valid_boundaries: Vec<(usize, usize)> = dense_boundaries(text)
            .into_iter()
            .filter(|b| !boundary_overlaps_tag(b.start, b.end, tag_spans))
            .map(|b| (b.start, b.end))
            .collect();

        if self.block_tags_as_boundaries && !analysis.block_boundaries.is_empty() {
            for &pos in &analysis.block_boundaries {
                let covered = valid_boundaries.iter().any(|&(s, e)| s <= pos && pos <= e);
                if !covered {
                    valid_boundaries.push((pos, pos));
                }
            }
            valid_boundaries.sort_unstable();
        }

        let mut spans = Vec::new();
        let mut start = 0usize;
        for (b_start, b_end) in &valid_boundaries {
            let (s_start, s_end) = trim_whitespace(text, start, *b_start);
            if s_start < s_end {
                spans.push((s_start, s_end));
            }
            start = *b_end;
        }
        let (s_start, s_end) = trim_whitespace(text, start, text.len());
        if s_start < s_end {
            spans.push((s_start, s_end));
        }

        let mut anchored = Vec::new();
        for (span_start, span_end) in spans {
            anchored.extend(split_span_by_word_anchor(
                text,
                span_start,
                span_end,
                self.anchor_every_words,
                Some(tag_spans),
            ));
        }

        anchored
            .into_iter()
            .enumerate()
            .map(|(index, (s, e))| Sentence { index, start: s, end: e, text: text[s..e].to_string() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_sentences() {
        let splitter = RegexSentenceSplitter;
        let sentences = splitter.split("A. B. C.");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "A.");
        assert_eq!(sentences[1].text, "B.");
        assert_eq!(sentences[2].text, "C.");
    }

    #[test]
    fn empty_input_yields_no_sentences() {
        assert!(RegexSentenceSplitter.split("").is_empty());
        assert!(RegexSentenceSplitter.split("   \n  ").is_empty());
    }

    #[test]
    fn splits_on_newlines() {
        let sentences = RegexSentenceSplitter.split("line one\nline two");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn dense_splitter_adds_word_anchors() {
        let splitter = DenseRegexSentenceSplitter::new(3, false);
        let sentences = splitter.split("one two three four five six seven eight nine");
        assert!(sentences.len() > 1);
    }

    #[test]
    fn dense_splitter_respects_digest_separators() {
        let splitter = DenseRegexSentenceSplitter::new(100, false);
        let sentences = splitter.split("first topic · second topic");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn html_aware_masks_script_content() {
        let splitter = HtmlAwareSentenceSplitter::new(100, true);
        let sentences = splitter.split("<p>Hello.</p><script>if (a > b) { x(); }</script><p>World.</p>");
        let joined: Vec<_> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert!(!joined.iter().any(|t| t.contains("script")));
    }

    #[test]
    fn html_aware_treats_block_tags_as_boundaries() {
        let splitter = HtmlAwareSentenceSplitter::new(100, true);
        let sentences = splitter.split("<div>First</div><div>Second</div>");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn trim_whitespace_does_not_panic_on_nbsp_boundary() {
        // U+00A0 (NBSP, as produced by `&nbsp;`) is 2 bytes in UTF-8; its
        // continuation byte, read alone, numerically matches the codepoint
        // and used to fool a byte-cast whitespace check into treating it as
        // whitespace while landing the cut mid-character.
        let text = "\u{a0}Hello\u{a0}";
        let (start, end) = trim_whitespace(text, 0, text.len());
        assert!(text.is_char_boundary(start));
        assert!(text.is_char_boundary(end));
        assert_eq!(&text[start..end], "Hello");
    }

    #[test]
    fn dense_splitter_does_not_panic_on_nbsp_near_anchor() {
        let splitter = DenseRegexSentenceSplitter::new(2, false);
        let text = "one\u{a0}two three four five six seven";
        let sentences = splitter.split(text);
        assert!(!sentences.is_empty());
        for s in &sentences {
            assert!(text.is_char_boundary(s.start));
            assert!(text.is_char_boundary(s.end));
        }
    }
}
