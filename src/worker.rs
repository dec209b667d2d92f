//! Background task worker (C13): claims queue entries, dispatches to the
//! matching task handler, and reports status back to both the queue and
//! the submission record. Grounded in `workers.py`'s `Worker` class —
//! `claim_task`/`process_task`/`_mark_task_completed`/`_mark_task_failed`/
//! `run` — with MongoDB's blocking `find_one_and_update` poll loop replaced
//! by [`Queue::claim`] and the `signal.signal` handlers replaced by
//! `tokio::signal`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::queue::{Queue, QueueEntry};
use crate::store::models::TaskStatus;
use crate::store::submissions::SubmissionStore;
use crate::tasks;
use crate::txt_splitt::protocols::LlmCallable;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct Worker {
    pool: SqlitePool,
    llm: Arc<dyn LlmCallable>,
    worker_id: String,
    running: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(pool: SqlitePool, llm: Arc<dyn LlmCallable>) -> Self {
        Self { pool, llm, worker_id: format!("worker-{}", std::process::id()), running: Arc::new(AtomicBool::new(true)) }
    }

    /// Poll-claim-execute loop. Exits once a shutdown signal flips
    /// `running` to `false`, mirroring `Worker.run`'s `while self.running`.
    pub async fn run(&self) {
        info!(worker_id = %self.worker_id, "worker started");
        self.install_signal_handlers();

        while self.running.load(Ordering::SeqCst) {
            match Queue::claim(&self.pool, &self.worker_id).await {
                Ok(Some(entry)) => self.process_task(entry).await,
                Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    error!(error = %e, "unexpected error claiming task");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        info!(worker_id = %self.worker_id, "worker stopped");
    }

    fn install_signal_handlers(&self) {
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received interrupt signal, shutting down gracefully...");
            running.store(false, Ordering::SeqCst);
        });

        #[cfg(unix)]
        {
            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                if let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    sigterm.recv().await;
                    info!("received SIGTERM, shutting down gracefully...");
                    running.store(false, Ordering::SeqCst);
                }
            });
        }
    }

    async fn process_task(&self, entry: QueueEntry) {
        let task_type = entry.task_type.clone();
        let submission_id = entry.submission_id.clone();

        info!(task_type = %task_type, submission_id = %submission_id, "processing task");

        if let Err(e) = SubmissionStore::update_task_status(&self.pool, &submission_id, &task_type, TaskStatus::Processing, None).await {
            error!(error = %e, "failed to mark task as processing");
        }

        let result = dispatch(&self.pool, Arc::clone(&self.llm), &task_type, &submission_id).await;

        match result {
            Ok(()) => {
                if let Err(e) = Queue::complete(&self.pool, &entry.id).await {
                    error!(error = %e, "failed to mark queue entry completed");
                }
                if let Err(e) = SubmissionStore::update_task_status(&self.pool, &submission_id, &task_type, TaskStatus::Completed, None).await {
                    error!(error = %e, "failed to mark task completed");
                }
                info!(task_type = %task_type, submission_id = %submission_id, "completed task");
            }
            Err(e) => {
                let message = e.to_string();
                warn!(task_type = %task_type, submission_id = %submission_id, error = %message, "task failed");
                if let Err(e) = Queue::fail(&self.pool, &entry.id, &message).await {
                    error!(error = %e, "failed to mark queue entry failed");
                }
                if let Err(e) = SubmissionStore::update_task_status(&self.pool, &submission_id, &task_type, TaskStatus::Failed, Some(&message)).await {
                    error!(error = %e, "failed to mark task failed");
                }
            }
        }
    }
}

async fn dispatch(pool: &SqlitePool, llm: Arc<dyn LlmCallable>, task_type: &str, submission_id: &str) -> anyhow::Result<()> {
    match task_type {
        "split_topic_generation" => tasks::split_topic_generation::process(pool, llm, submission_id).await,
        "subtopics_generation" => tasks::subtopics_generation::process(pool, llm, submission_id).await,
        "summarization" => tasks::summarization::process(pool, llm, submission_id).await,
        "mindmap" => tasks::mindmap::process(pool, llm, submission_id).await,
        "insides" => tasks::insides::process(pool, llm, submission_id).await,
        "prefix_tree" => tasks::prefix_tree::process(pool, llm, submission_id).await,
        other => anyhow::bail!("no handler registered for task type: {other}"),
    }
}
