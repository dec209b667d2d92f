//! Route handlers (C17), one per `spec.md` §6 endpoint. Grounded in
//! `handlers/submission_handler.py` and `handlers/task_queue_handler.py`
//! for business logic; request/response shapes follow `spec.md` §6
//! literally rather than FastAPI's pydantic models.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::errors::AppError;
use crate::http::state::AppState;
use crate::queue::Queue;
use crate::store::models::{Submission, TaskState, TaskStatus};
use crate::store::submissions::SubmissionStore;
use crate::tasks::registry::{self, TASK_NAMES};

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub html: String,
    #[serde(default)]
    pub source_url: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub submission_id: String,
    pub redirect_url: String,
}

async fn create_and_queue(state: &AppState, html_content: String, text_content: String, source_url: String) -> Result<SubmitResponse, AppError> {
    let submission = Submission::new(html_content, text_content, source_url);
    SubmissionStore::create(&state.pool, &submission).await?;

    let task_names: Vec<String> = TASK_NAMES.iter().map(|s| s.to_string()).collect();
    Queue::enqueue_many(&state.pool, &submission.id, &task_names).await?;

    Ok(SubmitResponse { redirect_url: format!("/page/text/{}", submission.id), submission_id: submission.id })
}

pub async fn post_submit(State(state): State<AppState>, Json(body): Json<SubmitRequest>) -> Result<Json<SubmitResponse>, AppError> {
    // The original keeps the raw HTML in `text_content` too, to avoid any
    // pre-cleaning before the pipeline's own HTML stripper runs.
    let response = create_and_queue(&state, body.html.clone(), body.html, body.source_url).await?;
    Ok(Json(response))
}

const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &[".html", ".htm", ".txt", ".md", ".pdf"];

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| format!(".{}", ext.to_lowercase()))
}

fn extract_upload_content(filename: &str, data: &[u8]) -> Result<(String, String), AppError> {
    let ext = extension_of(filename).unwrap_or_default();

    match ext.as_str() {
        ".html" | ".htm" | ".txt" => {
            let content = String::from_utf8_lossy(data).to_string();
            Ok((content.clone(), content))
        }
        ".md" => {
            let text = String::from_utf8_lossy(data).to_string();
            let parser = pulldown_cmark::Parser::new(&text);
            let mut html = String::new();
            pulldown_cmark::html::push_html(&mut html, parser);
            Ok((html, text))
        }
        ".pdf" => {
            let text_content = pdf_extract::extract_text_from_mem(data)
                .map_err(|e| AppError::BadRequest(format!("Could not parse PDF: {e}")))?;
            if text_content.trim().is_empty() {
                return Err(AppError::BadRequest("PDF appears to contain no extractable text (may be scanned/image-only).".to_string()));
            }
            let html_content = format!("<html><body><p>{}</p></body></html>", html_escape(&text_content));
            Ok((html_content, text_content))
        }
        other => Err(AppError::UnsupportedMediaType(format!(
            "Unsupported file type '{other}'. Allowed: {}",
            ALLOWED_UPLOAD_EXTENSIONS.join(", ")
        ))),
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub async fn post_upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<SubmitResponse>, AppError> {
    let mut filename = String::new();
    let mut data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.to_string()))? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?.to_vec();
        }
    }

    let ext = extension_of(&filename);
    if ext.as_deref().map(|e| !ALLOWED_UPLOAD_EXTENSIONS.contains(&e)).unwrap_or(true) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Unsupported file type. Allowed extensions: {}",
            ALLOWED_UPLOAD_EXTENSIONS.join(", ")
        )));
    }

    let (html_content, text_content) = extract_upload_content(&filename, &data)?;
    let response = create_and_queue(&state, html_content, text_content, filename).await?;
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub submission_id: String,
    pub tasks: HashMap<String, TaskState>,
    pub overall_status: TaskStatus,
}

pub async fn get_submission_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StatusResponse>, AppError> {
    let submission = SubmissionStore::get_by_id(&state.pool, &id).await?.ok_or_else(|| AppError::NotFound("Submission not found".into()))?;
    let overall_status = submission.overall_status();
    Ok(Json(StatusResponse { submission_id: submission.id, tasks: submission.tasks, overall_status }))
}

#[derive(Serialize)]
pub struct SubmissionStatusBlock {
    pub overall: TaskStatus,
    pub tasks: HashMap<String, TaskState>,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub submission_id: String,
    pub source_url: String,
    pub text_content: String,
    pub html_content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub status: SubmissionStatusBlock,
    pub results: Value,
}

pub async fn get_submission(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SubmissionResponse>, AppError> {
    let submission = SubmissionStore::get_by_id(&state.pool, &id).await?.ok_or_else(|| AppError::NotFound("Submission not found".into()))?;
    let overall = submission.overall_status();
    Ok(Json(SubmissionResponse {
        submission_id: submission.id,
        source_url: submission.source_url,
        text_content: submission.text_content,
        html_content: submission.html_content,
        created_at: submission.created_at,
        status: SubmissionStatusBlock { overall, tasks: submission.tasks },
        results: Value::Object(submission.results.0),
    }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub submission_id: String,
}

pub async fn delete_submission(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DeleteResponse>, AppError> {
    let existing = SubmissionStore::get_by_id(&state.pool, &id).await?;
    if existing.is_none() {
        return Err(AppError::NotFound("Submission not found".into()));
    }

    let deleted = SubmissionStore::delete(&state.pool, &id).await?;
    if !deleted {
        return Err(AppError::Internal(anyhow::anyhow!("Failed to delete submission")));
    }

    Ok(Json(DeleteResponse { message: "Submission deleted".to_string(), submission_id: id }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub tasks_queued: Vec<String>,
}

pub async fn post_refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    if SubmissionStore::get_by_id(&state.pool, &id).await?.is_none() {
        return Err(AppError::NotFound("Submission not found".into()));
    }

    let requested = body.tasks.filter(|t| !t.is_empty()).unwrap_or_else(|| vec!["all".to_string()]);
    let invalid: Vec<&String> = requested.iter().filter(|t| t.as_str() != "all" && !registry::is_known_task(t)).collect();
    if !invalid.is_empty() {
        let names: Vec<String> = invalid.into_iter().cloned().collect();
        return Err(AppError::BadRequest(format!("Unsupported task(s): {}", names.join(", "))));
    }

    let expanded = SubmissionStore::clear_results(&state.pool, &id, Some(&requested)).await?;

    for task_type in &expanded {
        sqlx::query("DELETE FROM task_queue WHERE submission_id = ? AND task_type = ? AND status IN ('pending', 'processing')")
            .bind(&id)
            .bind(task_type)
            .execute(&state.pool)
            .await?;
    }
    Queue::enqueue_many(&state.pool, &id, &expanded).await?;

    Ok(Json(RefreshResponse { message: "Tasks queued for recalculation".to_string(), tasks_queued: expanded }))
}

#[derive(Deserialize)]
pub struct ListSubmissionsQuery {
    pub submission_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct SubmissionListItem {
    pub submission_id: String,
    pub source_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub overall_status: TaskStatus,
    pub text_characters: usize,
    pub sentence_count: usize,
    pub topic_count: usize,
}

#[derive(Serialize)]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<SubmissionListItem>,
    pub count: usize,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListSubmissionsQuery>,
) -> Result<Json<ListSubmissionsResponse>, AppError> {
    let limit = query.limit.unwrap_or(100);
    if limit <= 0 {
        return Err(AppError::BadRequest("Limit must be positive".to_string()));
    }
    let limit = limit.min(1000);

    let submissions = SubmissionStore::list(&state.pool, query.submission_id.as_deref(), query.status, limit).await?;

    let items: Vec<SubmissionListItem> = submissions
        .into_iter()
        .map(|s| {
            let sentence_count = s.results.get::<Vec<Value>>("sentences").map(|v| v.len()).unwrap_or(0);
            let topic_count = s.results.get::<Vec<Value>>("topics").map(|v| v.len()).unwrap_or(0);
            SubmissionListItem {
                overall_status: s.overall_status(),
                submission_id: s.id,
                source_url: s.source_url,
                created_at: s.created_at,
                updated_at: s.updated_at,
                text_characters: s.text_content.chars().count(),
                sentence_count,
                topic_count,
            }
        })
        .collect();

    Ok(Json(ListSubmissionsResponse { count: items.len(), submissions: items }))
}

#[derive(Deserialize)]
pub struct ListTaskQueueQuery {
    pub submission_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct TaskQueueListResponse {
    pub tasks: Vec<crate::queue::QueueEntry>,
}

pub async fn list_task_queue(
    State(state): State<AppState>,
    Query(query): Query<ListTaskQueueQuery>,
) -> Result<Json<TaskQueueListResponse>, AppError> {
    let limit = query.limit.unwrap_or(100);
    if limit <= 0 {
        return Err(AppError::BadRequest("Limit must be positive".to_string()));
    }

    let tasks = Queue::list(&state.pool, query.submission_id.as_deref(), query.status, limit).await?;
    Ok(Json(TaskQueueListResponse { tasks }))
}

#[derive(Serialize)]
pub struct DeleteTaskResponse {
    pub deleted: bool,
    pub task_id: String,
}

pub async fn delete_task_queue_entry(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<DeleteTaskResponse>, AppError> {
    if uuid::Uuid::parse_str(&task_id).is_err() {
        return Err(AppError::BadRequest("Invalid task ID".to_string()));
    }

    let deleted = Queue::delete(&state.pool, &task_id).await?;
    if !deleted {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    Ok(Json(DeleteTaskResponse { deleted: true, task_id }))
}

#[derive(Serialize)]
pub struct RepeatTaskResponse {
    pub requeued: bool,
    pub tasks: Vec<String>,
    pub task_ids: Vec<String>,
}

pub async fn repeat_task_queue_entry(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<RepeatTaskResponse>, AppError> {
    if uuid::Uuid::parse_str(&task_id).is_err() {
        return Err(AppError::BadRequest("Invalid task ID".to_string()));
    }

    let (tasks, task_ids) = Queue::repeat(&state.pool, &task_id).await?.ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    Ok(Json(RepeatTaskResponse { requeued: true, tasks, task_ids }))
}

#[derive(Deserialize)]
pub struct AddTaskRequest {
    pub submission_id: String,
    pub task_type: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Serialize)]
pub struct AddTaskResponse {
    pub queued: bool,
    pub tasks: Vec<String>,
    pub task_ids: Vec<String>,
}

pub async fn add_task_queue_entry(State(state): State<AppState>, Json(body): Json<AddTaskRequest>) -> Result<Json<AddTaskResponse>, AppError> {
    if !registry::is_known_task(&body.task_type) {
        return Err(AppError::BadRequest("Unsupported task type".to_string()));
    }
    if SubmissionStore::get_by_id(&state.pool, &body.submission_id).await?.is_none() {
        return Err(AppError::NotFound("Submission not found".to_string()));
    }

    let expanded = registry::expand_recalculation_tasks(Some(std::slice::from_ref(&body.task_type)));
    SubmissionStore::clear_results(&state.pool, &body.submission_id, Some(std::slice::from_ref(&body.task_type))).await?;

    let task_ids = Queue::enqueue_many(&state.pool, &body.submission_id, &expanded).await?;
    if let Some(priority) = body.priority {
        for id in &task_ids {
            Queue::set_priority(&state.pool, id, priority).await?;
        }
    }

    Ok(Json(AddTaskResponse { queued: true, tasks: expanded, task_ids }))
}
