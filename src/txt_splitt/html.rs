//! HTML cleaner and offset restorer (C2).
//!
//! [`TagSpanScanner`] is a hand-rolled, tolerant byte-offset scanner over
//! start/end tags (including quoted attributes that may contain `>`),
//! comments, processing instructions, declarations, and bogus comments. It
//! plays the same role as Python's `html.parser.HTMLParser` does for the
//! original implementation's `_TagSpanParser`/`_HtmlAnalyzer`: a tolerant
//! tokenizer that still produces exact byte spans, not a DOM tree. No
//! third-party HTML crate is used here — see SPEC_FULL.md §4.1-4.10 for why.

use crate::txt_splitt::types::{OffsetMapping, OffsetSegment};
use std::collections::BTreeSet;

/// Tags treated as block-level boundaries (zero-width sentence cut points
/// when `HtmlAwareSentenceSplitter` is in use).
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

/// Tags whose body is raw, unparsed content to be masked entirely.
const RAW_CONTENT_TAGS: &[&str] = &["script", "style"];

fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_raw_content_tag(tag: &str) -> bool {
    RAW_CONTENT_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Result of scanning an HTML document: protected (tag-like) byte spans and
/// zero-width block-element boundary positions, both in source byte offsets.
#[derive(Debug, Default, Clone)]
pub struct HtmlAnalysis {
    /// Sorted, non-overlapping `(start, end)` spans that must not be cut
    /// through and are excluded from clean text.
    pub protected: Vec<(usize, usize)>,
    /// Sorted positions treated as zero-width sentence boundaries.
    pub block_boundaries: Vec<usize>,
}

/// Tolerant tag/comment/declaration/PI scanner producing byte-accurate spans.
pub struct TagSpanScanner;

impl TagSpanScanner {
    pub fn analyze(text: &str) -> HtmlAnalysis {
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut protected: Vec<(usize, usize)> = Vec::new();
        let mut block_boundaries: BTreeSet<usize> = BTreeSet::new();
        let mut raw_tag: Option<(String, usize)> = None; // (tag name, content start)

        let mut i = 0usize;
        while i < len {
            if bytes[i] != b'<' {
                i += 1;
                continue;
            }

            // Comment: <!-- ... -->
            if text[i..].starts_with("<!--") {
                let end = find_subslice(text, i + 4, "-->")
                    .map(|p| p + 3)
                    .unwrap_or(len);
                protected.push((i, end));
                i = end;
                continue;
            }

            // Processing instruction: <? ... >
            if text[i..].starts_with("<?") {
                let end = find_byte(bytes, i + 2, b'>').map(|p| p + 1).unwrap_or(len);
                protected.push((i, end));
                i = end;
                continue;
            }

            // Declaration / bogus comment: <! ... >
            if text[i..].starts_with("<!") {
                let end = find_byte(bytes, i + 2, b'>').map(|p| p + 1).unwrap_or(len);
                protected.push((i, end));
                i = end;
                continue;
            }

            // End tag: </name ...>
            if text[i..].starts_with("</") {
                let end = find_tag_end(bytes, i);
                let end = end.unwrap_or(len);
                protected.push((i, end));
                let tag_name = read_tag_name(text, i + 2);
                if is_block_tag(&tag_name) {
                    block_boundaries.insert(end);
                }
                if let Some((raw_name, content_start)) = raw_tag.as_ref() {
                    if raw_name.eq_ignore_ascii_case(&tag_name) {
                        if *content_start < i {
                            protected.push((*content_start, i));
                        }
                        raw_tag = None;
                    }
                }
                i = end;
                continue;
            }

            // Start tag (or self-closing / start-end tag): <name ...>
            if is_tag_name_start(bytes.get(i + 1).copied()) {
                match find_tag_end(bytes, i) {
                    Some(end) => {
                        let tag_name = read_tag_name(text, i + 1);
                        protected.push((i, end));
                        let self_closing = end >= 2 && bytes[end - 2] == b'/';
                        if is_block_tag(&tag_name) {
                            block_boundaries.insert(i);
                            if self_closing {
                                block_boundaries.insert(end);
                            }
                        }
                        if !self_closing && is_raw_content_tag(&tag_name) {
                            raw_tag = Some((tag_name, end));
                        }
                        i = end;
                    }
                    None => {
                        // Unterminated tag-looking construct: treat the
                        // remainder as protected, tolerating malformed input.
                        protected.push((i, len));
                        i = len;
                    }
                }
                continue;
            }

            // A lone `<` that doesn't open anything recognizable; leave it
            // as ordinary text and move on (tolerant parsing).
            i += 1;
        }

        protected.sort_unstable();
        HtmlAnalysis {
            protected,
            block_boundaries: block_boundaries.into_iter().collect(),
        }
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from.min(bytes.len())..].iter().position(|&b| b == needle).map(|p| p + from)
}

fn find_subslice(text: &str, from: usize, needle: &str) -> Option<usize> {
    let from = from.min(text.len());
    text[from..].find(needle).map(|p| p + from)
}

fn is_tag_name_start(byte: Option<u8>) -> bool {
    matches!(byte, Some(b) if b.is_ascii_alphabetic())
}

fn read_tag_name(text: &str, start: usize) -> String {
    text[start.min(text.len())..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect()
}

/// Scan forward from a `<` to the `>` that closes the tag, honoring quoted
/// attribute values that may themselves contain `>`.
fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let len = bytes.len();
    let mut i = start + 1;
    let mut quote: Option<u8> = None;
    while i < len {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Strip HTML constructs using [`TagSpanScanner`], producing clean text and
/// an [`OffsetMapping`] back to the original document. This is the
/// `HTMLParserTagStripCleaner` equivalent — the cleaner actually used by the
/// pipeline (C2's primary contract).
pub struct HtmlTagStripCleaner;

impl HtmlTagStripCleaner {
    pub fn clean(&self, text: &str) -> (String, OffsetMapping) {
        if text.is_empty() {
            return (String::new(), OffsetMapping::empty());
        }

        let analysis = TagSpanScanner::analyze(text);
        if analysis.protected.is_empty() {
            let mapping = OffsetMapping {
                segments: vec![OffsetSegment {
                    clean_offset: 0,
                    original_offset: 0,
                    length: text.len(),
                }],
                original_length: text.len(),
                clean_length: text.len(),
            };
            return (text.to_string(), mapping);
        }

        let mut segments = Vec::new();
        let mut clean_parts: Vec<&str> = Vec::new();
        let mut clean_offset = 0usize;
        let mut last_end = 0usize;

        for (tag_start, tag_end) in &analysis.protected {
            let tag_start = *tag_start;
            let tag_end = *tag_end;
            if tag_start > last_end {
                let seg_len = tag_start - last_end;
                segments.push(OffsetSegment {
                    clean_offset,
                    original_offset: last_end,
                    length: seg_len,
                });
                clean_parts.push(&text[last_end..tag_start]);
                clean_offset += seg_len;
            }
            if tag_end > last_end {
                last_end = tag_end;
            }
        }

        if last_end < text.len() {
            let seg_len = text.len() - last_end;
            segments.push(OffsetSegment {
                clean_offset,
                original_offset: last_end,
                length: seg_len,
            });
            clean_parts.push(&text[last_end..]);
            clean_offset += seg_len;
        }

        let clean_text: String = clean_parts.concat();
        let mapping = OffsetMapping {
            segments,
            original_length: text.len(),
            clean_length: clean_offset,
        };
        (clean_text, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_simple_tags() {
        let cleaner = HtmlTagStripCleaner;
        let (clean, mapping) = cleaner.clean("<p>Hello <b>world</b>.</p><p>Next.</p>");
        assert_eq!(clean, "Hello world.Next.");
        assert_eq!(mapping.to_original(0), 3);
    }

    #[test]
    fn masks_script_content() {
        let analysis = TagSpanScanner::analyze("a<script>var x = 1 > 2;</script>b");
        // the whole script tag + body should be protected, leaving "a" and "b" as clean text
        let cleaner = HtmlTagStripCleaner;
        let (clean, _mapping) = cleaner.clean("a<script>var x = 1 > 2;</script>b");
        assert_eq!(clean, "ab");
        assert!(!analysis.protected.is_empty());
    }

    #[test]
    fn tolerates_quoted_gt_in_attributes() {
        let (clean, _) = HtmlTagStripCleaner.clean("<a title=\"a > b\">text</a>");
        assert_eq!(clean, "text");
    }

    #[test]
    fn handles_comments_and_declarations() {
        let (clean, _) = HtmlTagStripCleaner.clean("<!DOCTYPE html><!-- note --><p>hi</p>");
        assert_eq!(clean, "hi");
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        let (clean, mapping) = HtmlTagStripCleaner.clean("");
        assert_eq!(clean, "");
        assert_eq!(mapping.clean_length, 0);
    }

    #[test]
    fn no_tags_is_identity() {
        let (clean, mapping) = HtmlTagStripCleaner.clean("plain text, no markup");
        assert_eq!(clean, "plain text, no markup");
        assert_eq!(mapping.to_original(0), 0);
        assert_eq!(mapping.to_original(clean.len()), clean.len());
    }
}
