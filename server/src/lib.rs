use std::sync::Arc;

use policy_ai::embeddings::OllamaEmbedder;
use policy_ai::ollama::OllamaClient;
use policy_core::config::Settings;
use policy_core::error::AppError;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod bootstrap;
pub mod chat;
pub mod cli;
pub mod http;

use cli::{Cli, Command};

/// Logs go to stderr so the chat loop owns stdout. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        AppError::new("STARTUP_TASK_FAILED", "Background task failed").with_details(e.to_string())
    })?
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = cli.settings();
    match cli.action() {
        Command::Serve => serve(settings).await,
        Command::Chat { show_context } => {
            let engine = blocking(move || bootstrap::build_engine(&settings)).await?;
            blocking(move || {
                let stdin = std::io::stdin();
                chat::run_chat(&engine, show_context, stdin.lock(), std::io::stdout())
            })
            .await
        }
        Command::Index => {
            let status = blocking(move || {
                let settings = Settings {
                    reuse_index: false,
                    ..settings
                };
                settings.validate()?;
                let client = OllamaClient::new(&settings.ollama_url)?;
                let store =
                    bootstrap::open_or_build_store(&settings, Arc::new(OllamaEmbedder::new(client)))?;
                Ok(store.status().clone())
            })
            .await?;
            let summary = serde_json::to_string_pretty(&status).map_err(|e| {
                AppError::new("INDEX_STATUS_FAILED", "Failed to render index status")
                    .with_details(e.to_string())
            })?;
            println!("{summary}");
            Ok(())
        }
    }
}

async fn serve(settings: Settings) -> Result<(), AppError> {
    let bind_addr = settings.bind_addr.clone();
    let answer_timeout = settings.answer_timeout();
    let engine = blocking(move || bootstrap::build_engine(&settings)).await?;
    let state = http::AppState::new(Arc::new(engine), answer_timeout);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.map_err(|e| {
        AppError::new("CONFIG_BIND_FAILED", "Failed to bind HTTP listener")
            .with_details(format!("addr={bind_addr}; err={e}"))
    })?;
    info!(addr = %bind_addr, "Serving policy assistant");

    axum::serve(listener, http::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::new("SERVER_FAILED", "HTTP server failed").with_details(e.to_string()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
