//! Process entry point (SPEC_FULL.md AMBIENT.3): `serve` runs the HTTP
//! edge only, `worker` runs the background task worker only, `run` (the
//! default) runs both in the same process — the common single-process
//! deployment implied by `spec.md`'s data-flow narrative, which does not
//! itself distinguish separate processes.

use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use txt_splitt_core::config::Settings;
use txt_splitt_core::http::{build_router, AppState};
use txt_splitt_core::llm::HttpLlmClient;
use txt_splitt_core::txt_splitt::protocols::LlmCallable;
use txt_splitt_core::worker::Worker;

#[derive(Parser)]
#[command(name = "txt-splitt", about = "Document analysis pipeline, task scheduler, and submission store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP edge only.
    Serve,
    /// Run the background task worker only.
    Worker,
    /// Run both the HTTP edge and the worker in this process (default).
    Run,
}

async fn connect_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(10).connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn build_llm(settings: &Settings) -> Arc<dyn LlmCallable> {
    Arc::new(HttpLlmClient::new(settings.llamacpp_url.clone(), settings.llm_model.clone(), settings.token.clone()))
}

async fn serve(pool: SqlitePool, llm: Arc<dyn LlmCallable>, bind_addr: &str) -> anyhow::Result<()> {
    let router = build_router(AppState { pool, llm });
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(bind_addr, "HTTP edge listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    info!(database_url = %settings.database_url, llamacpp_url = %settings.llamacpp_url, "loaded configuration");

    let pool = connect_pool(&settings.database_url).await?;
    let llm = build_llm(&settings);

    match cli.command.unwrap_or(Command::Run) {
        Command::Serve => serve(pool, llm, &settings.bind_addr).await?,
        Command::Worker => Worker::new(pool, llm).run().await,
        Command::Run => {
            let worker_pool = pool.clone();
            let worker_llm = Arc::clone(&llm);
            let worker_handle = tokio::spawn(async move { Worker::new(worker_pool, worker_llm).run().await });
            serve(pool, llm, &settings.bind_addr).await?;
            worker_handle.abort();
        }
    }

    Ok(())
}
