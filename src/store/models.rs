//! Row-level shapes persisted by [`super::submissions::SubmissionStore`] and
//! [`super::cache::PromptCache`].
//!
//! Mongo's original document shape (`submissions.{tasks,results}` as nested
//! BSON) becomes two `TEXT` columns holding `serde_json`-encoded values, per
//! the substitution SPEC_FULL.md AMBIENT.4 describes — the in-memory types
//! here are unchanged from the document shape `lib/storage/submissions.py`
//! builds in `SubmissionsStorage.create`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tasks::registry::TASK_NAMES;
use crate::txt_splitt::types::SentenceGroup;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Per-task status record, one per entry in [`TASK_NAMES`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self { status: TaskStatus::Pending, started_at: None, completed_at: None, error: None }
    }
}

/// A hierarchical topic, flattened for storage: `path` is the ordered label
/// segments a [`SentenceGroup`] carries, `name` is their `" > "`-joined
/// display form, and `sentences` holds 1-based sentence indices (matching
/// the 1-indexing every downstream task in `spec.md` §4.15 assumes).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub path: Vec<String>,
    pub sentences: Vec<usize>,
}

/// The sentinel label the original system reserves for sentences that
/// belong to no meaningful topic. The gap handlers' synthesized fallback
/// group (label `["Uncategorized"]`) is this crate's equivalent — there is
/// no dedicated "unassigned" bucket in the coverage-complete pipeline, so
/// both spellings are treated as the same sentinel by derived-artifact
/// tasks that must skip it.
pub fn is_no_topic(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    lower == "no_topic" || lower == "uncategorized"
}

pub fn topics_from_groups(groups: &[SentenceGroup]) -> Vec<Topic> {
    groups
        .iter()
        .map(|g| Topic {
            name: g.label.join(" > "),
            path: g.label.clone(),
            sentences: g.ranges.iter().flat_map(|r| (r.start..=r.end).map(|i| i + 1)).collect(),
        })
        .collect()
}

/// A submission's accumulated task outputs, stored as a loosely-typed JSON
/// object — the same role `results: dict` plays in the original, now
/// structurally enforced per-field by each task handler rather than by a
/// single schema. Keys match `spec.md` §3's `results` field list exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmissionResults(pub Map<String, Value>);

impl Default for SubmissionResults {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("sentences".into(), Value::Array(vec![]));
        map.insert("topics".into(), Value::Array(vec![]));
        map.insert("topic_summaries".into(), Value::Object(Map::new()));
        map.insert("topic_mindmaps".into(), Value::Object(Map::new()));
        map.insert("mindmap_results".into(), Value::Array(vec![]));
        map.insert("mindmap_metadata".into(), Value::Object(Map::new()));
        map.insert("subtopics".into(), Value::Array(vec![]));
        map.insert("summary".into(), Value::Array(vec![]));
        map.insert("summary_mappings".into(), Value::Array(vec![]));
        map.insert("insides".into(), Value::Array(vec![]));
        map.insert("prefix_tree".into(), Value::Object(Map::new()));
        Self(map)
    }
}

impl SubmissionResults {
    pub fn get<T: for<'de> Deserialize<'de>>(&self, field: &str) -> Option<T> {
        self.0.get(field).cloned().and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn merge(&mut self, partial: HashMap<String, Value>) {
        for (k, v) in partial {
            self.0.insert(k, v);
        }
    }
}

/// A submission: the durable state machine tying content to its task
/// statuses and accumulated results (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub html_content: String,
    pub text_content: String,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tasks: HashMap<String, TaskState>,
    pub results: SubmissionResults,
}

impl Submission {
    pub fn new(html_content: String, text_content: String, source_url: String) -> Self {
        let now = Utc::now();
        let tasks = TASK_NAMES.iter().map(|&name| (name.to_string(), TaskState::default())).collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            html_content,
            text_content,
            source_url,
            created_at: now,
            updated_at: now,
            tasks,
            results: SubmissionResults::default(),
        }
    }

    /// Reduces per-task statuses to one overall status, in the priority
    /// order `spec.md` §4.14 fixes: `failed > processing > completed(all) >
    /// pending`.
    pub fn overall_status(&self) -> TaskStatus {
        let statuses: Vec<TaskStatus> = self.tasks.values().map(|t| t.status).collect();
        if statuses.iter().any(|s| matches!(s, TaskStatus::Failed)) {
            TaskStatus::Failed
        } else if statuses.iter().all(|s| matches!(s, TaskStatus::Completed)) {
            TaskStatus::Completed
        } else if statuses.iter().any(|s| matches!(s, TaskStatus::Processing)) {
            TaskStatus::Processing
        } else {
            TaskStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_submission_has_all_tasks_pending() {
        let sub = Submission::new("<p>hi</p>".into(), "hi".into(), "".into());
        assert_eq!(sub.tasks.len(), TASK_NAMES.len());
        assert!(sub.tasks.values().all(|t| matches!(t.status, TaskStatus::Pending)));
        assert!(matches!(sub.overall_status(), TaskStatus::Pending));
    }

    #[test]
    fn overall_status_prioritizes_failed_over_processing() {
        let mut sub = Submission::new(String::new(), String::new(), String::new());
        for state in sub.tasks.values_mut() {
            state.status = TaskStatus::Completed;
        }
        sub.tasks.get_mut("mindmap").unwrap().status = TaskStatus::Processing;
        sub.tasks.get_mut("insides").unwrap().status = TaskStatus::Failed;
        assert!(matches!(sub.overall_status(), TaskStatus::Failed));
    }

    #[test]
    fn no_topic_sentinel_matches_both_spellings() {
        assert!(is_no_topic("no_topic"));
        assert!(is_no_topic("Uncategorized"));
        assert!(!is_no_topic("Technology"));
    }
}
