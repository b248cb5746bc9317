use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use inbox_agent::api;
use inbox_agent::config::AppConfig;
use inbox_agent::knowledge::{EmbeddingBackend, LibSqlKnowledgeStore, create_embedder};
use inbox_agent::llm::create_provider;
use inbox_agent::services::Services;
use inbox_agent::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Inbox Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   LLM: {} ({})", config.llm.backend.name(), config.llm.model);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let backend = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Knowledge store ─────────────────────────────────────────────────
    match &config.embedding {
        EmbeddingBackend::Local => eprintln!("   Embeddings: local (fastembed)"),
        EmbeddingBackend::Remote { model, .. } => eprintln!("   Embeddings: {model}"),
        EmbeddingBackend::Stub => eprintln!("   Embeddings: hashing stub"),
    }
    let embedding = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedder(&embedding))
        .await
        .context("Embedding model loader panicked")?;
    let knowledge = Arc::new(LibSqlKnowledgeStore::new(backend.connection(), embedder));

    // ── Services ────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = backend;
    let llm = create_provider(&config.llm, Arc::clone(&db)).context("Failed to create LLM provider")?;
    let services = Arc::new(Services::new(db, llm, knowledge));

    if config.seed {
        services.seed().await.context("Failed to seed database")?;
    }

    // ── HTTP server ─────────────────────────────────────────────────────
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    eprintln!("   API: http://{addr}\n");
    tracing::info!(%addr, "HTTP server started");

    axum::serve(listener, api::router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Stderr logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
