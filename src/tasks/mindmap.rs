//! Mindmap generation (C15): per-topic hierarchical extraction with
//! importance/type scoring, plus cross-topic relationship mining
//! (`spec.md` §4.15, grounded in `lib/tasks/mindmap.py`'s
//! `generate_mindmap_for_topic` / `extract_cross_topic_relationships` /
//! `flatten_structure` / `process_mindmap`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::store::models::{is_no_topic, Topic};
use crate::store::submissions::SubmissionStore;
use crate::tasks::cached_call;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::types::Sentence;

const TEMPERATURE: f32 = 0.2;
const DEFAULT_IMPORTANCE: u8 = 3;
const DEFAULT_TYPE: &str = "concept";
const VALID_TYPES: &[&str] = &["concept", "entity", "action", "example", "attribute", "relationship"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MindmapNode {
    pub importance: u8,
    #[serde(rename = "type")]
    pub node_type: String,
    pub children: HashMap<String, MindmapNode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicMetadataEntry {
    pub importance: u8,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MindmapResultEntry {
    pub sentence_index: usize,
    pub sentence: String,
    pub mindmap_topics: Vec<Vec<String>>,
    pub topic_metadata: Vec<TopicMetadataEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlatNode {
    pub name: String,
    pub path: Vec<String>,
    pub importance: u8,
    #[serde(rename = "type")]
    pub node_type: String,
    pub has_children: bool,
    pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub relationship: String,
    pub target: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MindmapMetadata {
    pub node_count: usize,
    pub importance_distribution: HashMap<String, i32>,
    pub type_distribution: HashMap<String, i32>,
    pub all_nodes: Vec<FlatNode>,
    pub cross_topic_relationships: Vec<Relationship>,
}

fn mark_words(text: &str) -> (String, Vec<&str>) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let marked = words.iter().enumerate().map(|(i, w)| format!("{w} |#{i}#|")).collect::<Vec<_>>().join(" ");
    (marked, words)
}

fn mindmap_prompt(marked_text: &str) -> String {
    format!(
        "You are given a text where every word is followed by a numbered marker |#N#|.\n\
Your task is to extract a mind map structure from this text by identifying the word ranges that represent topics and subtopics.\n\n\
CRITICAL INSTRUCTIONS FOR BREVITY AND MEANINGFUL EXTRACTION:\n\
- EXTRACT ONLY THE MOST MEANINGFUL KEY TERMS: Focus on the core concepts that define each topic.\n\
- PRIORITIZE BREVITY ABOVE ALL ELSE: Node titles must be as short as possible while retaining meaning.\n\
- IDEAL LENGTH: 1-3 words maximum. Never exceed 4 words unless absolutely necessary for clarity.\n\n\
IMPORTANCE SCORING (1-5): 5=critical, 4=important, 3=relevant, 2=minor, 1=incidental.\n\n\
NODE TYPES: concept, entity, action, example, attribute, relationship.\n\n\
Return a hierarchical list of word ranges with importance scores and types in the format:\n\
Topic_Range | Importance_Score | Node_Type\n\
Topic_Range, Subtopic_Range | Importance_Score | Node_Type\n\n\
Format for a range is: start-end (inclusive, marker numbers).\n\n\
Example Output:\n\
3-3 | 5 | entity\n\
3-3, 8-8 | 4 | relationship\n\
10-12 | 3 | example\n\n\
<content>\n{marked_text}\n</content>\n\nMind map:"
    )
}

struct ParsedLine {
    hierarchy: Vec<String>,
    importance: u8,
    node_type: String,
    ranges: Vec<(usize, usize)>,
}

fn clean_range(raw: &str) -> Option<(usize, usize)> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
    let mut parts = cleaned.splitn(2, '-');
    let start = parts.next()?;
    let end = parts.next()?;
    if start.is_empty() || end.is_empty() {
        return None;
    }
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn parse_line(line: &str, topic_name: &str, words: &[&str]) -> Option<ParsedLine> {
    let mut hierarchy = vec![topic_name.to_string()];
    let mut ranges = Vec::new();
    let mut importance = DEFAULT_IMPORTANCE;
    let mut node_type = DEFAULT_TYPE.to_string();

    for part in line.split(',') {
        let part = part.trim();
        let range_str = if part.contains('|') {
            let meta: Vec<&str> = part.split('|').map(str::trim).collect();
            if let Some(imp_str) = meta.get(1) {
                if let Ok(value) = imp_str.parse::<i32>() {
                    importance = value.clamp(1, 5) as u8;
                }
            }
            if let Some(type_str) = meta.get(2) {
                let lowered = type_str.to_lowercase();
                if VALID_TYPES.contains(&lowered.as_str()) {
                    node_type = lowered;
                }
            }
            meta[0]
        } else {
            part
        };

        if !range_str.contains('-') {
            return None;
        }
        let (start, end) = clean_range(range_str)?;
        if start > end || end >= words.len() {
            return None;
        }

        let topic_text = words[start..=end].join(" ");
        if topic_text.to_lowercase() == hierarchy.last().map(|s| s.to_lowercase()).unwrap_or_default() {
            continue;
        }
        hierarchy.push(topic_text);
        ranges.push((start, end));
    }

    Some(ParsedLine { hierarchy, importance, node_type, ranges })
}

fn add_to_structure(struct_: &mut HashMap<String, MindmapNode>, hierarchy: &[String], importance: u8, node_type: &str) {
    let Some((node, rest)) = hierarchy.split_first() else { return };
    let entry = struct_.entry(node.clone()).or_insert_with(|| MindmapNode { importance, node_type: node_type.to_string(), children: HashMap::new() });
    if rest.is_empty() {
        entry.importance = importance;
        entry.node_type = node_type.to_string();
    }
    if !rest.is_empty() {
        add_to_structure(&mut entry.children, rest, importance, node_type);
    }
}

async fn generate_for_topic(
    pool: &SqlitePool,
    llm: &Arc<dyn LlmCallable>,
    topic_name: &str,
    sentences_text: &[&str],
    sentence_indices: &[usize],
) -> anyhow::Result<(HashMap<String, MindmapNode>, Vec<MindmapResultEntry>)> {
    if sentences_text.is_empty() {
        return Ok((HashMap::new(), Vec::new()));
    }

    let mut combined = String::new();
    let mut boundaries = Vec::with_capacity(sentences_text.len());
    let mut word_idx = 0usize;
    for sent in sentences_text {
        let count = sent.split_whitespace().count();
        boundaries.push((word_idx, word_idx + count.saturating_sub(1)));
        if !combined.is_empty() {
            combined.push(' ');
        }
        combined.push_str(sent);
        word_idx += count;
    }

    let (marked_text, words) = mark_words(&combined);
    let prompt = mindmap_prompt(&marked_text);
    let response = cached_call(pool, llm, &prompt, TEMPERATURE).await?;

    let mut structure: HashMap<String, MindmapNode> = HashMap::new();
    let mut sentence_to_hierarchies: HashMap<usize, Vec<(Vec<String>, u8, String)>> = HashMap::new();

    for line in response.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(parsed) = parse_line(line, topic_name, &words) else { continue };

        add_to_structure(&mut structure, &parsed.hierarchy[1..], parsed.importance, &parsed.node_type);

        for (r_start, r_end) in &parsed.ranges {
            for (i, (s_start, s_end)) in boundaries.iter().enumerate() {
                if r_start.max(s_start) <= r_end.min(s_end) {
                    let orig_idx = sentence_indices[i];
                    let entries = sentence_to_hierarchies.entry(orig_idx).or_default();
                    let candidate = (parsed.hierarchy.clone(), parsed.importance, parsed.node_type.clone());
                    if !entries.contains(&candidate) {
                        entries.push(candidate);
                    }
                }
            }
        }
    }

    let mut results = Vec::with_capacity(sentence_indices.len());
    for (i, &orig_idx) in sentence_indices.iter().enumerate() {
        let hierarchies = sentence_to_hierarchies
            .get(&orig_idx)
            .cloned()
            .unwrap_or_else(|| vec![(vec![topic_name.to_string()], 5, DEFAULT_TYPE.to_string())]);

        results.push(MindmapResultEntry {
            sentence_index: orig_idx,
            sentence: sentences_text[i].to_string(),
            mindmap_topics: hierarchies.iter().map(|(path, _, _)| path.clone()).collect(),
            topic_metadata: hierarchies.iter().map(|(_, imp, ty)| TopicMetadataEntry { importance: *imp, node_type: ty.clone() }).collect(),
        });
    }

    Ok((structure, results))
}

fn collect_nodes(struct_: &HashMap<String, MindmapNode>, prefix: &str, out: &mut Vec<String>) {
    for (name, node) in struct_ {
        out.push(format!("{prefix}{name}"));
        if !node.children.is_empty() {
            collect_nodes(&node.children, &format!("{prefix}  > "), out);
        }
    }
}

fn relationships_prompt(topics_summary: &str) -> String {
    format!(
        "Analyze the following topics and identify cross-topic relationships.\n\
For each relationship, specify source, relationship type, target, and a brief description.\n\n\
Relationship types: extends, example_of, contrasts_with, supports, prerequisite, related_to.\n\n\
Topics:\n{topics_summary}\n\n\
Return relationships in this format (one per line):\n\
Source | Relationship | Target | Description\n\n\
Relationships:"
    )
}

async fn extract_cross_topic_relationships(
    pool: &SqlitePool,
    llm: &Arc<dyn LlmCallable>,
    topic_count: usize,
    topic_mindmaps: &HashMap<String, HashMap<String, MindmapNode>>,
) -> anyhow::Result<Vec<Relationship>> {
    if topic_count < 2 {
        return Ok(Vec::new());
    }

    let mut summaries = Vec::new();
    for (topic_name, structure) in topic_mindmaps {
        let mut nodes = Vec::new();
        collect_nodes(structure, "", &mut nodes);
        nodes.truncate(10);
        summaries.push(format!("Topic: {topic_name}\nKey nodes:\n{}", nodes.join("\n")));
    }

    let prompt = relationships_prompt(&summaries.join("\n\n"));
    let response = cached_call(pool, llm, &prompt, TEMPERATURE).await?;

    let mut relationships = Vec::new();
    for line in response.trim().lines() {
        let line = line.trim();
        if line.is_empty() || !line.contains('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() >= 3 {
            relationships.push(Relationship {
                source: parts[0].to_string(),
                relationship: parts[1].to_lowercase().replace(' ', "_"),
                target: parts[2].to_string(),
                description: parts.get(3).map(|s| s.to_string()).unwrap_or_default(),
            });
        }
    }

    Ok(relationships)
}

fn flatten_structure(structure: &HashMap<String, MindmapNode>, parent_path: &[String]) -> Vec<FlatNode> {
    let mut nodes = Vec::new();
    for (name, node) in structure {
        let mut path = parent_path.to_vec();
        path.push(name.clone());
        nodes.push(FlatNode {
            name: name.clone(),
            path: path.clone(),
            importance: node.importance,
            node_type: node.node_type.clone(),
            has_children: !node.children.is_empty(),
            topic: String::new(),
        });
        nodes.extend(flatten_structure(&node.children, &path));
    }
    nodes
}

pub async fn process(pool: &SqlitePool, llm: Arc<dyn LlmCallable>, submission_id: &str) -> anyhow::Result<()> {
    let submission = SubmissionStore::get_by_id(pool, submission_id)
        .await?
        .ok_or_else(|| anyhow!("submission {submission_id} not found"))?;

    let sentences: Vec<Sentence> = submission.results.get("sentences").unwrap_or_default();
    let topics: Vec<Topic> = submission.results.get("topics").unwrap_or_default();

    if topics.is_empty() || sentences.is_empty() {
        anyhow::bail!("topic extraction must be completed first");
    }

    let mut topic_mindmaps: HashMap<String, HashMap<String, MindmapNode>> = HashMap::new();
    let mut all_results = Vec::new();

    for topic in &topics {
        if topic.sentences.is_empty() || is_no_topic(&topic.name) {
            continue;
        }
        let topic_texts: Vec<&str> = topic.sentences.iter().filter_map(|&idx| sentences.get(idx - 1)).map(|s| s.text.as_str()).collect();
        if topic_texts.is_empty() {
            continue;
        }

        let (structure, results) = generate_for_topic(pool, &llm, &topic.name, &topic_texts, &topic.sentences).await?;
        topic_mindmaps.insert(topic.name.clone(), structure);
        all_results.extend(results);
    }

    let relationships = extract_cross_topic_relationships(pool, &llm, topics.len(), &topic_mindmaps).await?;

    let mut all_nodes = Vec::new();
    for (topic_name, structure) in &topic_mindmaps {
        for mut node in flatten_structure(structure, &[]) {
            node.topic = topic_name.clone();
            all_nodes.push(node);
        }
    }

    let mut importance_distribution: HashMap<String, i32> = (1..=5).map(|i| (i.to_string(), 0)).collect();
    let mut type_distribution: HashMap<String, i32> = HashMap::new();
    for node in &all_nodes {
        *importance_distribution.entry(node.importance.to_string()).or_insert(0) += 1;
        *type_distribution.entry(node.node_type.clone()).or_insert(0) += 1;
    }

    let metadata = MindmapMetadata {
        node_count: all_nodes.len(),
        importance_distribution,
        type_distribution,
        all_nodes,
        cross_topic_relationships: relationships,
    };

    let mut partial = HashMap::new();
    partial.insert("topic_mindmaps".to_string(), serde_json::to_value(&topic_mindmaps)?);
    partial.insert("mindmap_results".to_string(), serde_json::to_value(&all_results)?);
    partial.insert("mindmap_metadata".to_string(), serde_json::to_value(&metadata)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range_with_importance_and_type() {
        let words = vec!["artificial", "intelligence", "systems"];
        let parsed = parse_line("0-1 | 5 | entity", "AI", &words).unwrap();
        assert_eq!(parsed.hierarchy, vec!["AI".to_string(), "artificial intelligence".to_string()]);
        assert_eq!(parsed.importance, 5);
        assert_eq!(parsed.node_type, "entity");
    }

    #[test]
    fn clamps_out_of_range_importance() {
        let words = vec!["a", "b"];
        let parsed = parse_line("0-1 | 99 | concept", "T", &words).unwrap();
        assert_eq!(parsed.importance, 5);
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        let words = vec!["a", "b"];
        assert!(parse_line("0-5 | 3 | concept", "T", &words).is_none());
    }

    #[test]
    fn skips_range_duplicating_parent_name() {
        let words = vec!["Topic", "word"];
        let parsed = parse_line("0-0 | 3 | concept", "Topic", &words).unwrap();
        assert_eq!(parsed.hierarchy, vec!["Topic".to_string()]);
        assert!(parsed.ranges.is_empty());
    }

    #[test]
    fn flatten_structure_marks_has_children() {
        let mut children = HashMap::new();
        children.insert("child".to_string(), MindmapNode { importance: 2, node_type: "concept".to_string(), children: HashMap::new() });
        let mut structure = HashMap::new();
        structure.insert("root".to_string(), MindmapNode { importance: 4, node_type: "entity".to_string(), children });

        let flat = flatten_structure(&structure, &[]);
        let root = flat.iter().find(|n| n.name == "root").unwrap();
        assert!(root.has_children);
        let child = flat.iter().find(|n| n.name == "child").unwrap();
        assert!(!child.has_children);
        assert_eq!(child.path, vec!["root".to_string(), "child".to_string()]);
    }
}
