//! Submission lifecycle and result store (C14).
//!
//! `sqlx`-backed, one async fn per operation named in `spec.md` §4.14, in
//! the static-struct-of-async-fns style of
//! `database/repositories/chat_message.rs`'s `ChatMessagesRepository`.
//! `tasks`/`results` are JSON-encoded `TEXT` columns (SPEC_FULL.md
//! AMBIENT.4) rather than native nested columns.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use crate::store::models::{Submission, TaskState, TaskStatus};
use crate::tasks::registry::expand_recalculation_tasks;

pub struct SubmissionStore;

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: String,
    html_content: String,
    text_content: String,
    source_url: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    tasks_json: String,
    results_json: String,
}

impl SubmissionRow {
    fn into_submission(self) -> Result<Submission, sqlx::Error> {
        let tasks: HashMap<String, TaskState> =
            serde_json::from_str(&self.tasks_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let results_map: serde_json::Map<String, Value> =
            serde_json::from_str(&self.results_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Submission {
            id: self.id,
            html_content: self.html_content,
            text_content: self.text_content,
            source_url: self.source_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tasks,
            results: crate::store::models::SubmissionResults(results_map),
        })
    }
}

impl SubmissionStore {
    pub async fn create(pool: &SqlitePool, submission: &Submission) -> Result<(), sqlx::Error> {
        let tasks_json = serde_json::to_string(&submission.tasks).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let results_json = serde_json::to_string(&submission.results.0).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO submissions
             (id, html_content, text_content, source_url, created_at, updated_at, tasks_json, results_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&submission.id)
        .bind(&submission.html_content)
        .bind(&submission.text_content)
        .bind(&submission.source_url)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .bind(&tasks_json)
        .bind(&results_json)
        .execute(pool)
        .await?;

        info!(submission_id = %submission.id, "created submission");
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, submission_id: &str) -> Result<Option<Submission>, sqlx::Error> {
        let row: Option<SubmissionRow> = sqlx::query_as(
            "SELECT id, html_content, text_content, source_url, created_at, updated_at, tasks_json, results_json
             FROM submissions WHERE id = ?",
        )
        .bind(submission_id)
        .fetch_optional(pool)
        .await?;

        row.map(SubmissionRow::into_submission).transpose()
    }

    pub async fn list(
        pool: &SqlitePool,
        submission_id: Option<&str>,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<Submission>, sqlx::Error> {
        let rows: Vec<SubmissionRow> = sqlx::query_as(
            "SELECT id, html_content, text_content, source_url, created_at, updated_at, tasks_json, results_json
             FROM submissions
             WHERE (?1 IS NULL OR id = ?1)
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(submission_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let submissions: Result<Vec<Submission>, sqlx::Error> = rows.into_iter().map(SubmissionRow::into_submission).collect();
        let submissions = submissions?;

        Ok(match status {
            Some(want) => submissions.into_iter().filter(|s| s.overall_status() == want).collect(),
            None => submissions,
        })
    }

    pub async fn delete(pool: &SqlitePool, submission_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM submissions WHERE id = ?").bind(submission_id).execute(pool).await?;
        sqlx::query("DELETE FROM task_queue WHERE submission_id = ?").bind(submission_id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_task_status(
        pool: &SqlitePool,
        submission_id: &str,
        task_name: &str,
        status: TaskStatus,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let Some(mut submission) = Self::get_by_id(pool, submission_id).await? else {
            return Ok(false);
        };

        let entry = submission.tasks.entry(task_name.to_string()).or_default();
        entry.status = status;
        let now = Utc::now();
        match status {
            TaskStatus::Processing => entry.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed => entry.completed_at = Some(now),
            TaskStatus::Pending => {}
        }
        if let Some(err) = error {
            entry.error = Some(err.to_string());
        }

        Self::save_tasks_and_touch(pool, submission_id, &submission.tasks).await
    }

    pub async fn update_results(
        pool: &SqlitePool,
        submission_id: &str,
        partial: HashMap<String, Value>,
    ) -> Result<bool, sqlx::Error> {
        let Some(mut submission) = Self::get_by_id(pool, submission_id).await? else {
            return Ok(false);
        };
        submission.results.merge(partial);

        let results_json = serde_json::to_string(&submission.results.0).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query("UPDATE submissions SET results_json = ?, updated_at = ? WHERE id = ?")
            .bind(&results_json)
            .bind(Utc::now())
            .bind(submission_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset task statuses to `pending` and clear the result fields owned
    /// by the expanded downstream closure of `task_names` (`spec.md` §4.14,
    /// ported field-for-field from `SubmissionsStorage.clear_results`).
    pub async fn clear_results(
        pool: &SqlitePool,
        submission_id: &str,
        task_names: Option<&[String]>,
    ) -> Result<Vec<String>, sqlx::Error> {
        let expanded = expand_recalculation_tasks(task_names);

        let Some(mut submission) = Self::get_by_id(pool, submission_id).await? else {
            return Ok(expanded);
        };

        for name in &expanded {
            submission.tasks.insert(name.clone(), TaskState::default());
        }

        let results = &mut submission.results.0;
        if expanded.iter().any(|t| t == "split_topic_generation") {
            results.insert("sentences".into(), Value::Array(vec![]));
            results.insert("topics".into(), Value::Array(vec![]));
        }
        if expanded.iter().any(|t| t == "subtopics_generation") {
            results.insert("subtopics".into(), Value::Array(vec![]));
        }
        if expanded.iter().any(|t| t == "summarization") {
            results.insert("topic_summaries".into(), Value::Object(Default::default()));
            results.insert("summary".into(), Value::Array(vec![]));
            results.insert("summary_mappings".into(), Value::Array(vec![]));
        }
        if expanded.iter().any(|t| t == "mindmap") {
            results.insert("topic_mindmaps".into(), Value::Object(Default::default()));
            results.insert("mindmap_results".into(), Value::Array(vec![]));
            results.insert("mindmap_metadata".into(), Value::Object(Default::default()));
        }
        if expanded.iter().any(|t| t == "insides") {
            results.insert("insides".into(), Value::Array(vec![]));
        }
        if expanded.iter().any(|t| t == "prefix_tree") {
            results.insert("prefix_tree".into(), Value::Object(Default::default()));
        }

        let tasks_json = serde_json::to_string(&submission.tasks).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let results_json = serde_json::to_string(&submission.results.0).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query("UPDATE submissions SET tasks_json = ?, results_json = ?, updated_at = ? WHERE id = ?")
            .bind(&tasks_json)
            .bind(&results_json)
            .bind(Utc::now())
            .bind(submission_id)
            .execute(pool)
            .await?;

        Ok(expanded)
    }

    pub async fn get_overall_status(pool: &SqlitePool, submission_id: &str) -> Result<Option<TaskStatus>, sqlx::Error> {
        Ok(Self::get_by_id(pool, submission_id).await?.map(|s| s.overall_status()))
    }

    async fn save_tasks_and_touch(
        pool: &SqlitePool,
        submission_id: &str,
        tasks: &HashMap<String, TaskState>,
    ) -> Result<bool, sqlx::Error> {
        let tasks_json = serde_json::to_string(tasks).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query("UPDATE submissions SET tasks_json = ?, updated_at = ? WHERE id = ?")
            .bind(&tasks_json)
            .bind(Utc::now())
            .bind(submission_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_fetch_round_trips() {
        let pool = test_pool().await;
        let submission = Submission::new("<p>hi</p>".into(), "hi".into(), "test.html".into());
        SubmissionStore::create(&pool, &submission).await.unwrap();

        let fetched = SubmissionStore::get_by_id(&pool, &submission.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, submission.id);
        assert_eq!(fetched.text_content, "hi");
    }

    #[tokio::test]
    async fn update_task_status_persists_and_stamps_timestamps() {
        let pool = test_pool().await;
        let submission = Submission::new("html".into(), "text".into(), "src".into());
        SubmissionStore::create(&pool, &submission).await.unwrap();

        SubmissionStore::update_task_status(&pool, &submission.id, "split_topic_generation", TaskStatus::Processing, None)
            .await
            .unwrap();
        let fetched = SubmissionStore::get_by_id(&pool, &submission.id).await.unwrap().unwrap();
        let task = &fetched.tasks["split_topic_generation"];
        assert!(matches!(task.status, TaskStatus::Processing));
        assert!(task.started_at.is_some());

        SubmissionStore::update_task_status(&pool, &submission.id, "split_topic_generation", TaskStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let fetched = SubmissionStore::get_by_id(&pool, &submission.id).await.unwrap().unwrap();
        let task = &fetched.tasks["split_topic_generation"];
        assert!(matches!(task.status, TaskStatus::Failed));
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn clear_results_resets_downstream_closure() {
        let pool = test_pool().await;
        let submission = Submission::new("html".into(), "text".into(), "src".into());
        SubmissionStore::create(&pool, &submission).await.unwrap();

        let mut partial = HashMap::new();
        partial.insert("sentences".to_string(), Value::Array(vec![Value::String("a sentence".into())]));
        SubmissionStore::update_results(&pool, &submission.id, partial).await.unwrap();
        SubmissionStore::update_task_status(&pool, &submission.id, "split_topic_generation", TaskStatus::Completed, None)
            .await
            .unwrap();

        let expanded = SubmissionStore::clear_results(&pool, &submission.id, Some(&["split_topic_generation".to_string()])).await.unwrap();
        assert!(expanded.contains(&"mindmap".to_string()));

        let fetched = SubmissionStore::get_by_id(&pool, &submission.id).await.unwrap().unwrap();
        assert_eq!(fetched.results.0.get("sentences"), Some(&Value::Array(vec![])));
        assert!(matches!(fetched.tasks["split_topic_generation"].status, TaskStatus::Pending));
    }

    #[tokio::test]
    async fn delete_removes_submission_and_its_queue_entries() {
        let pool = test_pool().await;
        let submission = Submission::new("html".into(), "text".into(), "src".into());
        SubmissionStore::create(&pool, &submission).await.unwrap();

        assert!(SubmissionStore::delete(&pool, &submission.id).await.unwrap());
        assert!(SubmissionStore::get_by_id(&pool, &submission.id).await.unwrap().is_none());
        assert!(!SubmissionStore::delete(&pool, &submission.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_overall_status() {
        let pool = test_pool().await;
        let pending = Submission::new("html".into(), "text".into(), "a".into());
        let completed = Submission::new("html".into(), "text".into(), "b".into());
        SubmissionStore::create(&pool, &pending).await.unwrap();
        SubmissionStore::create(&pool, &completed).await.unwrap();
        for task in crate::tasks::registry::TASK_NAMES {
            SubmissionStore::update_task_status(&pool, &completed.id, task, TaskStatus::Completed, None).await.unwrap();
        }

        let done = SubmissionStore::list(&pool, None, Some(TaskStatus::Completed), 10).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, completed.id);
    }
}
