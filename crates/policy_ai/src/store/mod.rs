use std::path::{Path, PathBuf};
use std::sync::Arc;

use policy_core::domain::{Chunk, DocumentMetadata};
use policy_core::error::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::embeddings::Embedder;

mod db;
pub mod similarity;

/// Persisted build metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    /// Embedding model the vectors were computed with; queries must use the same one.
    pub model: String,
    /// `None` for an index built from zero chunks.
    pub dims: Option<u32>,
    pub chunk_count: u32,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub ordinal: u32,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
}

/// One similarity-search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub ordinal: u32,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: f32,
}

/// Read-only, in-memory view of a persisted vector store.
///
/// Built (or reopened) once at startup and shared across requests; nothing mutates it
/// afterwards, so concurrent `similarity_search` calls need no locking.
pub struct VectorStore {
    persist_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    status: IndexStatus,
    records: Vec<VectorRecord>,
    norms: Vec<f32>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("persist_dir", &self.persist_dir)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Deterministic across rebuilds of the same input.
pub fn chunk_id(chunk: &Chunk) -> String {
    let input = format!(
        "v1|{}|{}|{}",
        chunk.metadata.source, chunk.ordinal, chunk.text
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}

impl VectorStore {
    /// Embed every chunk and persist the result under `persist_dir`, replacing whatever
    /// was stored there before. Nothing is written unless every embedding succeeds.
    pub fn build(
        persist_dir: &Path,
        embedder: Arc<dyn Embedder>,
        model: &str,
        chunks: &[Chunk],
        built_at: &str,
    ) -> Result<Self, AppError> {
        let mut dims: Option<u32> = None;
        let mut records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let id = chunk_id(chunk);
            let v = embedder.embed(model, &chunk.text).map_err(|e| {
                AppError::new("INDEX_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                    .with_details(format!("chunk_id={}; err={}", id, e))
                    .with_retryable(e.retryable)
            })?;
            let this_dims = v.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        "INDEX_EMBEDDING_DIMS_MISMATCH",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!("expected={}; got={}; chunk_id={}", d, this_dims, id)));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            records.push(VectorRecord {
                chunk_id: id,
                ordinal: chunk.ordinal,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                embedding: v,
            });
        }

        let status = IndexStatus {
            model: model.to_string(),
            dims,
            chunk_count: records.len() as u32,
            built_at: built_at.to_string(),
        };

        let mut conn = db::open(persist_dir)?;
        db::replace_all(&mut conn, &status, &records)?;

        info!(
            path = %db::db_path(persist_dir).display(),
            chunks = status.chunk_count,
            dims = ?status.dims,
            model = %status.model,
            "Built vector store"
        );
        Ok(Self::from_parts(persist_dir, embedder, status, records))
    }

    /// Reopen a store persisted by an earlier `build`.
    pub fn open(persist_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, AppError> {
        let path = db::db_path(persist_dir);
        if !path.exists() {
            return Err(AppError::new(
                "INDEX_NOT_READY",
                "No persisted vector store; build the index first",
            )
            .with_details(format!("path={}", path.display())));
        }
        let conn = db::open(persist_dir)?;
        let status = db::read_status(&conn)?.ok_or_else(|| {
            AppError::new("INDEX_NOT_READY", "Vector store has no build status; rebuild the index")
                .with_details(format!("path={}", path.display()))
        })?;
        let records = db::read_records(&conn)?;
        if records.len() as u32 != status.chunk_count {
            return Err(AppError::new(
                "INDEX_STORE_FAILED",
                "Vector store record count does not match its status",
            )
            .with_details(format!(
                "expected={}; got={}",
                status.chunk_count,
                records.len()
            )));
        }

        info!(path = %path.display(), chunks = records.len(), "Opened vector store");
        Ok(Self::from_parts(persist_dir, embedder, status, records))
    }

    fn from_parts(
        persist_dir: &Path,
        embedder: Arc<dyn Embedder>,
        status: IndexStatus,
        records: Vec<VectorRecord>,
    ) -> Self {
        let norms = records
            .iter()
            .map(|r| similarity::l2_norm(&r.embedding))
            .collect();
        Self {
            persist_dir: persist_dir.to_path_buf(),
            embedder,
            status,
            records,
            norms,
        }
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn status(&self) -> &IndexStatus {
        &self.status
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The `k` stored chunks closest to `query` by cosine similarity, best first.
    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(&self.status.model, query).map_err(|e| {
            AppError::new("INDEX_EMBEDDINGS_FAILED", "Failed to embed query")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        })?;
        if let Some(dims) = self.status.dims {
            if qv.len() as u32 != dims {
                return Err(AppError::new(
                    "INDEX_QUERY_DIMS_MISMATCH",
                    "Query embedding dims do not match index dims",
                )
                .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
            }
        }
        let qnorm = similarity::l2_norm(&qv);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "INDEX_QUERY_EMBEDDING_ZERO",
                "Query embedding norm is zero",
            ));
        }

        let scored = self
            .records
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .filter(|(_, (_, norm))| **norm > 0.0)
            .map(|(i, (r, &norm))| (i, similarity::cosine_similarity(&qv, &r.embedding, qnorm, norm)))
            .collect::<Vec<_>>();

        let hits = similarity::top_k(scored, k)
            .into_iter()
            .map(|(i, score)| {
                let r = &self.records[i];
                ScoredChunk {
                    chunk_id: r.chunk_id.clone(),
                    ordinal: r.ordinal,
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                    score,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            k,
            hits = hits.len(),
            top_score = ?hits.first().map(|h| h.score),
            "Similarity search"
        );
        Ok(hits)
    }
}
