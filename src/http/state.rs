use std::sync::Arc;

use sqlx::SqlitePool;

use crate::txt_splitt::protocols::LlmCallable;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub llm: Arc<dyn LlmCallable>,
}
