use std::sync::Arc;

use policy_ai::answer::AnswerEngine;
use policy_ai::embeddings::{Embedder, OllamaEmbedder};
use policy_ai::llm::OllamaLlm;
use policy_ai::ollama::OllamaClient;
use policy_ai::store::VectorStore;
use policy_core::chunking::TextSplitter;
use policy_core::config::Settings;
use policy_core::error::AppError;
use policy_core::ingest::load_documents;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new("INDEX_TIME_FAILED", "Failed to format time").with_details(e.to_string()))
}

/// Load, chunk and embed the policy directory, or reopen the persisted store when
/// `settings.reuse_index` is set.
pub fn open_or_build_store(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
) -> Result<VectorStore, AppError> {
    if settings.reuse_index {
        info!(path = %settings.persist_dir.display(), "Opening persisted vector store...");
        let store = VectorStore::open(&settings.persist_dir, embedder)?;
        if store.status().model != settings.embedding_model {
            warn!(
                stored = %store.status().model,
                configured = %settings.embedding_model,
                "Persisted store was built with a different embedding model; queries use the stored one"
            );
        }
        return Ok(store);
    }

    info!(dir = %settings.docs_dir.display(), "Loading policy documents...");
    let documents = load_documents(&settings.docs_dir)?;

    info!("Chunking documents...");
    let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
    let chunks = splitter.split_documents(&documents);

    info!("Creating vector store...");
    VectorStore::build(
        &settings.persist_dir,
        embedder,
        &settings.embedding_model,
        &chunks,
        &now_rfc3339_utc()?,
    )
}

/// Wire the Ollama-backed pipeline. Blocks on network and disk I/O.
pub fn build_engine(settings: &Settings) -> Result<AnswerEngine, AppError> {
    settings.validate()?;
    let client = OllamaClient::new(&settings.ollama_url)?;
    match client.health_check() {
        Ok(()) => info!(base_url = %client.base_url(), "Ollama is reachable"),
        Err(e) => warn!(error = %e, "Ollama health check failed; requests will fail until it is reachable"),
    }

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(client.clone()));
    let store = open_or_build_store(settings, embedder)?;

    let llm = OllamaLlm::new(client, settings.answer_timeout()).with_temperature(settings.temperature);
    info!(
        chunks = store.len(),
        llm_model = %settings.llm_model,
        top_k = settings.top_k,
        "Policy assistant ready"
    );
    Ok(AnswerEngine::new(
        Arc::new(store),
        Arc::new(llm),
        &settings.llm_model,
        settings.top_k,
    ))
}
