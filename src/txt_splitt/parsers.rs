//! Response parser implementations (stage 4).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SplitterError};
use crate::txt_splitt::protocols::ResponseParser;
use crate::txt_splitt::types::{SentenceGroup, SentenceRange};

static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)").unwrap());
static SINGLE_NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").unwrap());

/// Parses LLM topic-range responses of the form
/// `Category>Subcategory>Topic: 0-5, 10-15` into [`SentenceGroup`]s.
///
/// Ranges are clamped to `[0, sentence_count - 1]` and sorted by start.
/// Does not fill gaps or validate coverage — that is the gap handler's job.
pub struct TopicRangeParser;

impl ResponseParser for TopicRangeParser {
    fn parse(&self, response: &str, sentence_count: usize) -> Result<Vec<SentenceGroup>> {
        if sentence_count == 0 {
            return Err(SplitterError::Parse("sentence_count must be positive".into()));
        }

        let max_index = sentence_count - 1;
        let mut groups = Vec::new();

        for line in response.trim().lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(colon) = line.find(':') else { continue };
            let topic_path = line[..colon].trim();
            let ranges_str = line[colon + 1..].trim();
            if topic_path.is_empty() {
                continue;
            }

            let label: Vec<String> = topic_path
                .split('>')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if label.is_empty() {
                continue;
            }

            let mut clamped: Vec<SentenceRange> = parse_range_string(ranges_str)
                .into_iter()
                .map(|(start, end)| {
                    let start = start.min(max_index);
                    let end = end.min(max_index);
                    if start > end {
                        SentenceRange::new(end, start)
                    } else {
                        SentenceRange::new(start, end)
                    }
                })
                .collect();
            clamped.sort_unstable_by_key(|r| (r.start, r.end));

            if !clamped.is_empty() {
                groups.push(SentenceGroup { label, ranges: clamped });
            }
        }

        if groups.is_empty() {
            return Err(SplitterError::Parse("No valid topic ranges found in response".into()));
        }

        Ok(groups)
    }
}

fn parse_range_string(ranges_str: &str) -> Vec<(usize, usize)> {
    let mut results = Vec::new();
    for part in ranges_str.split(',').map(str::trim) {
        if part.contains('-') && !part.starts_with('-') {
            if let Some(caps) = RANGE_PATTERN.captures(part) {
                let start: usize = caps[1].parse().unwrap();
                let end: usize = caps[2].parse().unwrap();
                results.push((start, end));
                continue;
            }
        }
        if let Some(caps) = SINGLE_NUMBER_PATTERN.captures(part) {
            let n: usize = caps[1].parse().unwrap();
            results.push((n, n));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_topic_with_ranges() {
        let groups = TopicRangeParser.parse("Tech>AI: 0-5, 10-15", 20).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, vec!["Tech".to_string(), "AI".to_string()]);
        assert_eq!(groups[0].ranges, vec![SentenceRange::new(0, 5), SentenceRange::new(10, 15)]);
    }

    #[test]
    fn clamps_ranges_to_sentence_count() {
        let groups = TopicRangeParser.parse("Topic: 0-100", 10).unwrap();
        assert_eq!(groups[0].ranges, vec![SentenceRange::new(0, 9)]);
    }

    #[test]
    fn swaps_inverted_ranges() {
        let groups = TopicRangeParser.parse("Topic: 8-2", 10).unwrap();
        assert_eq!(groups[0].ranges, vec![SentenceRange::new(2, 8)]);
    }

    #[test]
    fn single_numbers_become_degenerate_ranges() {
        let groups = TopicRangeParser.parse("Topic: 3", 10).unwrap();
        assert_eq!(groups[0].ranges, vec![SentenceRange::new(3, 3)]);
    }

    #[test]
    fn ignores_lines_without_a_colon() {
        let groups = TopicRangeParser.parse("no colon here\nTopic: 0-1", 5).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn errors_when_no_valid_ranges_found() {
        assert!(TopicRangeParser.parse("garbage\nmore garbage", 5).is_err());
    }

    #[test]
    fn errors_on_zero_sentence_count() {
        assert!(TopicRangeParser.parse("Topic: 0-1", 0).is_err());
    }
}
