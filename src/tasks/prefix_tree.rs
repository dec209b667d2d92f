//! Prefix tree (C15): a compressed radix trie over every word in the
//! submission's sentences, with per-terminal-node occurrence counts and
//! sentence positions (`spec.md` §4.15, grounded in
//! `lib/tasks/prefix_tree.py`'s `build_compressed_trie` / `_compress_node`).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::store::submissions::SubmissionStore;
use crate::txt_splitt::protocols::LlmCallable;
use crate::txt_splitt::types::Sentence;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z']+").unwrap());

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrieNode {
    pub children: HashMap<String, TrieNode>,
    pub count: u32,
    pub sentences: Vec<usize>,
}

fn extract_words(sentence: &str) -> Vec<String> {
    let lower = sentence.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .filter_map(|m| {
            let word = m.as_str().trim_matches('\'');
            if word.is_empty() {
                None
            } else {
                Some(word.to_string())
            }
        })
        .collect()
}

fn compress_node(node: &mut TrieNode) {
    for child in node.children.values_mut() {
        compress_node(child);
    }

    let old_children = std::mem::take(&mut node.children);
    let mut new_children = HashMap::with_capacity(old_children.len());
    for (label, child) in old_children {
        let mut current_label = label;
        let mut current_child = child;
        while current_child.children.len() == 1 && current_child.count == 0 {
            let (child_label, grandchild) = current_child.children.into_iter().next().unwrap();
            current_label.push_str(&child_label);
            current_child = grandchild;
        }
        new_children.insert(current_label, current_child);
    }
    node.children = new_children;
}

pub fn build_compressed_trie(sentences: &[String]) -> HashMap<String, TrieNode> {
    let mut word_data: HashMap<String, (u32, BTreeSet<usize>)> = HashMap::new();
    for (i, sentence) in sentences.iter().enumerate() {
        for word in extract_words(sentence) {
            let entry = word_data.entry(word).or_insert((0, BTreeSet::new()));
            entry.0 += 1;
            entry.1.insert(i + 1);
        }
    }

    let mut root = TrieNode::default();
    for (word, (count, sentence_set)) in word_data {
        let mut node = &mut root;
        for ch in word.chars() {
            node = node.children.entry(ch.to_string()).or_default();
        }
        node.count = count;
        node.sentences = sentence_set.into_iter().collect();
    }

    compress_node(&mut root);
    root.children
}

pub async fn process(pool: &SqlitePool, _llm: Arc<dyn LlmCallable>, submission_id: &str) -> anyhow::Result<()> {
    let submission = SubmissionStore::get_by_id(pool, submission_id)
        .await?
        .ok_or_else(|| anyhow!("submission {submission_id} not found"))?;

    let sentences: Vec<Sentence> = submission.results.get("sentences").unwrap_or_default();
    let texts: Vec<String> = sentences.into_iter().map(|s| s.text).collect();
    let tree = build_compressed_trie(&texts);

    let mut partial = HashMap::new();
    partial.insert("prefix_tree".to_string(), serde_json::to_value(&tree)?);
    SubmissionStore::update_results(pool, submission_id, partial).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lowercased_words_and_strips_apostrophes() {
        let words = extract_words("Don't Panic! It's fine.");
        assert_eq!(words, vec!["don't", "panic", "it's", "fine"]);
    }

    #[test]
    fn compresses_single_child_chains() {
        let tree = build_compressed_trie(&["cat cats".to_string()]);
        // "cat" is a terminal node (count=1) so its "s" child cannot merge upward
        // into it, but the shared prefix itself collapses into one edge.
        assert!(tree.contains_key("cat"));
        let cat = &tree["cat"];
        assert_eq!(cat.count, 1);
        assert!(cat.children.contains_key("s"));
    }

    #[test]
    fn records_one_based_sentence_positions() {
        let tree = build_compressed_trie(&["hello world".to_string(), "hello again".to_string()]);
        let hello = &tree["hello"];
        assert_eq!(hello.sentences, vec![1, 2]);
    }
}
