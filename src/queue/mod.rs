//! Persistent task queue (C12): atomic claim / fail / complete / requeue.
//!
//! `QueueEntry` rows live in the `task_queue` SQLite table. Claim is a
//! single `UPDATE ... WHERE id = (SELECT ...) RETURNING *` per task type —
//! SQLite serializes writers, so this statement is the at-most-once
//! primitive `spec.md` §9 asks for, the structural analogue of the
//! MongoDB `find_one_and_update` in `workers.py::Worker.claim_task`.
//! Dependency checking happens after claim, exactly as in the original:
//! an unmet claim is released back to `pending` without touching
//! `retry_count`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::store::models::TaskStatus;
use crate::store::submissions::SubmissionStore;
use crate::tasks::registry::{self, TASK_NAMES};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: String,
    pub submission_id: String,
    pub task_type: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub retry_count: i32,
    pub error: Option<String>,
}

pub struct Queue;

impl Queue {
    /// Insert a new `pending` entry for `task_type` on `submission_id`,
    /// first deleting any existing `pending|processing` entry for the same
    /// `(submission_id, task_type)` pair — the "stricter" duplicate-task
    /// policy DESIGN.md records as the Open Question decision for §9's
    /// "task-queue duplicate task types" note.
    pub async fn enqueue(pool: &SqlitePool, submission_id: &str, task_type: &str) -> Result<String, sqlx::Error> {
        sqlx::query("DELETE FROM task_queue WHERE submission_id = ? AND task_type = ? AND status IN ('pending', 'processing')")
            .bind(submission_id)
            .bind(task_type)
            .execute(pool)
            .await?;

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO task_queue (id, submission_id, task_type, priority, status, created_at, retry_count)
             VALUES (?, ?, ?, ?, 'pending', ?, 0)",
        )
        .bind(&id)
        .bind(submission_id)
        .bind(task_type)
        .bind(registry::priority_of(task_type))
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(id)
    }

    pub async fn enqueue_many(pool: &SqlitePool, submission_id: &str, task_types: &[String]) -> Result<Vec<String>, sqlx::Error> {
        let mut ids = Vec::with_capacity(task_types.len());
        for task_type in task_types {
            ids.push(Self::enqueue(pool, submission_id, task_type).await?);
        }
        Ok(ids)
    }

    /// Try to claim one pending entry, trying task types in priority order
    /// (lower first, ties broken by [`TASK_NAMES`] declaration order) —
    /// mirrors `claim_task`'s outer loop over
    /// `sorted(TASK_HANDLERS, key=priority)`. Within a type, the atomic
    /// `UPDATE ... RETURNING` picks the oldest `pending` row. If the
    /// claimed entry's prerequisites aren't all `completed` yet, it is
    /// released back to `pending` (no `retry_count` bump) and the next
    /// type is tried.
    pub async fn claim(pool: &SqlitePool, worker_id: &str) -> Result<Option<QueueEntry>, sqlx::Error> {
        let mut ordered: Vec<&str> = TASK_NAMES.to_vec();
        ordered.sort_by_key(|t| registry::priority_of(t));

        for task_type in ordered {
            let Some(entry) = Self::claim_one_of_type(pool, worker_id, task_type).await? else {
                continue;
            };

            if Self::dependencies_met(pool, &entry).await? {
                info!(task_type = %entry.task_type, submission_id = %entry.submission_id, worker_id, "claimed task");
                return Ok(Some(entry));
            }

            debug!(task_type = %entry.task_type, submission_id = %entry.submission_id, "dependencies unmet, releasing");
            sqlx::query("UPDATE task_queue SET status = 'pending', started_at = NULL, worker_id = NULL WHERE id = ?")
                .bind(&entry.id)
                .execute(pool)
                .await?;
        }

        Ok(None)
    }

    async fn claim_one_of_type(pool: &SqlitePool, worker_id: &str, task_type: &str) -> Result<Option<QueueEntry>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE task_queue SET status = 'processing', started_at = ?, worker_id = ?
             WHERE id = (
                 SELECT id FROM task_queue WHERE status = 'pending' AND task_type = ?
                 ORDER BY priority ASC, created_at ASC LIMIT 1
             )
             RETURNING *",
        )
        .bind(Utc::now())
        .bind(worker_id)
        .bind(task_type)
        .fetch_optional(pool)
        .await
    }

    async fn dependencies_met(pool: &SqlitePool, entry: &QueueEntry) -> Result<bool, sqlx::Error> {
        // Every task in this registry depends on nothing but
        // `split_topic_generation` (spec.md §4.11), so checking that one
        // task's status covers all prerequisites uniformly.
        if entry.task_type == "split_topic_generation" {
            return Ok(true);
        }

        let Some(submission) = SubmissionStore::get_by_id(pool, &entry.submission_id).await? else {
            return Ok(false);
        };
        Ok(submission.tasks.get("split_topic_generation").map(|t| matches!(t.status, TaskStatus::Completed)).unwrap_or(false))
    }

    pub async fn complete(pool: &SqlitePool, entry_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE task_queue SET status = 'completed', completed_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(entry_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn fail(pool: &SqlitePool, entry_id: &str, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE task_queue SET status = 'failed', completed_at = ?, error = ?, retry_count = retry_count + 1 WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(entry_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_priority(pool: &SqlitePool, entry_id: &str, priority: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE task_queue SET priority = ? WHERE id = ?").bind(priority).bind(entry_id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, entry_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_queue WHERE id = ?").bind(entry_id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-enqueue `entry_id`'s task and its downstream closure, clearing
    /// the corresponding submission results and any in-flight entries for
    /// those tasks first. Returns `(expanded task types, inserted entry
    /// ids)` so callers can report both, as the original's
    /// `{"tasks": expanded, "task_ids": inserted}` response shape does.
    pub async fn repeat(pool: &SqlitePool, entry_id: &str) -> Result<Option<(Vec<String>, Vec<String>)>, sqlx::Error> {
        let Some(entry) = Self::get(pool, entry_id).await? else {
            return Ok(None);
        };

        let expanded = SubmissionStore::clear_results(pool, &entry.submission_id, Some(std::slice::from_ref(&entry.task_type))).await?;

        sqlx::query(
            "DELETE FROM task_queue WHERE submission_id = ? AND task_type IN (SELECT value FROM json_each(?)) AND status IN ('pending', 'processing')",
        )
        .bind(&entry.submission_id)
        .bind(serde_json::to_string(&expanded).unwrap_or_default())
        .execute(pool)
        .await?;

        let task_ids = Self::enqueue_many(pool, &entry.submission_id, &expanded).await?;
        Ok(Some((expanded, task_ids)))
    }

    pub async fn get(pool: &SqlitePool, entry_id: &str) -> Result<Option<QueueEntry>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM task_queue WHERE id = ?").bind(entry_id).fetch_optional(pool).await
    }

    pub async fn list(
        pool: &SqlitePool,
        submission_id: Option<&str>,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<QueueEntry>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM task_queue
             WHERE (?1 IS NULL OR submission_id = ?1)
             AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC
             LIMIT ?3",
        )
        .bind(submission_id)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::Submission;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seeded_submission(pool: &SqlitePool) -> Submission {
        let submission = Submission::new("html".into(), "text".into(), "src".into());
        SubmissionStore::create(pool, &submission).await.unwrap();
        submission
    }

    #[tokio::test]
    async fn enqueue_deletes_prior_pending_entry_for_same_type() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;

        let first = Queue::enqueue(&pool, &submission.id, "mindmap").await.unwrap();
        Queue::enqueue(&pool, &submission.id, "mindmap").await.unwrap();

        assert!(Queue::get(&pool, &first).await.unwrap().is_none());
        let all = Queue::list(&pool, Some(&submission.id), None, 10).await.unwrap();
        assert_eq!(all.iter().filter(|e| e.task_type == "mindmap").count(), 1);
    }

    #[tokio::test]
    async fn claim_releases_entries_with_unmet_dependencies() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;
        Queue::enqueue(&pool, &submission.id, "mindmap").await.unwrap();

        // split_topic_generation hasn't completed yet, so mindmap can't be claimed.
        assert!(Queue::claim(&pool, "worker-1").await.unwrap().is_none());

        let entries = Queue::list(&pool, Some(&submission.id), None, 10).await.unwrap();
        assert!(matches!(entries[0].status, TaskStatus::Pending));
    }

    #[tokio::test]
    async fn claim_picks_up_root_task_then_downstream_once_completed() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;
        Queue::enqueue_many(&pool, &submission.id, &TASK_NAMES.iter().map(|s| s.to_string()).collect::<Vec<_>>()).await.unwrap();

        let root = Queue::claim(&pool, "worker-1").await.unwrap().unwrap();
        assert_eq!(root.task_type, "split_topic_generation");
        Queue::complete(&pool, &root.id).await.unwrap();
        SubmissionStore::update_task_status(&pool, &submission.id, "split_topic_generation", TaskStatus::Completed, None).await.unwrap();

        let next = Queue::claim(&pool, "worker-1").await.unwrap().unwrap();
        assert_eq!(next.task_type, "subtopics_generation");
    }

    #[tokio::test]
    async fn fail_bumps_retry_count_and_records_error() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;
        let id = Queue::enqueue(&pool, &submission.id, "split_topic_generation").await.unwrap();
        let entry = Queue::claim(&pool, "worker-1").await.unwrap().unwrap();
        assert_eq!(entry.id, id);

        Queue::fail(&pool, &id, "llm timeout").await.unwrap();
        let refetched = Queue::get(&pool, &id).await.unwrap().unwrap();
        assert!(matches!(refetched.status, TaskStatus::Failed));
        assert_eq!(refetched.retry_count, 1);
        assert_eq!(refetched.error.as_deref(), Some("llm timeout"));
    }

    #[tokio::test]
    async fn repeat_clears_results_and_returns_expanded_closure_and_new_ids() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;
        let id = Queue::enqueue(&pool, &submission.id, "split_topic_generation").await.unwrap();

        let (expanded, new_ids) = Queue::repeat(&pool, &id).await.unwrap().unwrap();
        assert_eq!(expanded, TASK_NAMES.to_vec());
        assert_eq!(new_ids.len(), TASK_NAMES.len());
    }

    #[tokio::test]
    async fn set_priority_updates_existing_entry() {
        let pool = test_pool().await;
        let submission = seeded_submission(&pool).await;
        let id = Queue::enqueue(&pool, &submission.id, "mindmap").await.unwrap();

        assert!(Queue::set_priority(&pool, &id, 9).await.unwrap());
        assert_eq!(Queue::get(&pool, &id).await.unwrap().unwrap().priority, 9);
    }
}
