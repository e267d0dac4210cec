use std::fs;
use std::path::{Path, PathBuf};

use policy_core::domain::DocumentMetadata;
use policy_core::error::AppError;
use rusqlite::{params, Connection, OptionalExtension};

use super::{IndexStatus, VectorRecord};

pub(crate) const DB_FILE_NAME: &str = "vectors.sqlite";

const SCHEMA: &str = r#"
  CREATE TABLE IF NOT EXISTS index_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    model TEXT NOT NULL,
    dims INTEGER,
    chunk_count INTEGER NOT NULL,
    built_at TEXT NOT NULL
  );
  CREATE TABLE IF NOT EXISTS vector_records (
    chunk_id TEXT PRIMARY KEY NOT NULL,
    ordinal INTEGER NOT NULL UNIQUE,
    text TEXT NOT NULL,
    source TEXT NOT NULL,
    policy_type TEXT NOT NULL,
    embedding BLOB NOT NULL
  );
"#;

pub(crate) fn db_path(persist_dir: &Path) -> PathBuf {
    persist_dir.join(DB_FILE_NAME)
}

fn store_err(message: &str, e: impl std::fmt::Display) -> AppError {
    AppError::new("INDEX_STORE_FAILED", message).with_details(e.to_string())
}

pub(crate) fn open(persist_dir: &Path) -> Result<Connection, AppError> {
    fs::create_dir_all(persist_dir).map_err(|e| {
        AppError::new("INDEX_STORE_FAILED", "Failed to create vector store directory")
            .with_details(format!("path={}; err={}", persist_dir.display(), e))
    })?;
    let path = db_path(persist_dir);
    let conn = Connection::open(&path).map_err(|e| {
        AppError::new("INDEX_STORE_FAILED", "Failed to open vector store database")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| store_err("Failed to ensure vector store schema", e))?;
    Ok(conn)
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, AppError> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::new("INDEX_STORE_FAILED", "Stored embedding is truncated")
            .with_details(format!("bytes={}", bytes.len())));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Replace the entire store contents in one transaction.
pub(crate) fn replace_all(
    conn: &mut Connection,
    status: &IndexStatus,
    records: &[VectorRecord],
) -> Result<(), AppError> {
    let tx = conn
        .transaction()
        .map_err(|e| store_err("Failed to start vector store transaction", e))?;

    tx.execute("DELETE FROM vector_records", [])
        .map_err(|e| store_err("Failed to clear vector records", e))?;
    tx.execute("DELETE FROM index_status", [])
        .map_err(|e| store_err("Failed to clear index status", e))?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO vector_records(chunk_id, ordinal, text, source, policy_type, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| store_err("Failed to prepare vector record insert", e))?;
        for r in records {
            stmt.execute(params![
                r.chunk_id,
                r.ordinal,
                r.text,
                r.metadata.source,
                r.metadata.policy_type,
                encode_embedding(&r.embedding),
            ])
            .map_err(|e| {
                AppError::new("INDEX_STORE_FAILED", "Failed to insert vector record")
                    .with_details(format!("chunk_id={}; err={}", r.chunk_id, e))
            })?;
        }
    }

    tx.execute(
        "INSERT INTO index_status(id, model, dims, chunk_count, built_at) VALUES (1, ?1, ?2, ?3, ?4)",
        params![status.model, status.dims, status.chunk_count, status.built_at],
    )
    .map_err(|e| store_err("Failed to write index status", e))?;

    tx.commit()
        .map_err(|e| store_err("Failed to commit vector store transaction", e))?;
    Ok(())
}

pub(crate) fn read_status(conn: &Connection) -> Result<Option<IndexStatus>, AppError> {
    conn.query_row(
        "SELECT model, dims, chunk_count, built_at FROM index_status WHERE id = 1",
        [],
        |row| {
            Ok(IndexStatus {
                model: row.get(0)?,
                dims: row.get(1)?,
                chunk_count: row.get(2)?,
                built_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(|e| store_err("Failed to read index status", e))
}

pub(crate) fn read_records(conn: &Connection) -> Result<Vec<VectorRecord>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT chunk_id, ordinal, text, source, policy_type, embedding
             FROM vector_records ORDER BY ordinal ASC",
        )
        .map_err(|e| store_err("Failed to query vector records", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
            ))
        })
        .map_err(|e| store_err("Failed to read vector records", e))?;

    let mut out = Vec::new();
    for r in rows {
        let (chunk_id, ordinal, text, source, policy_type, blob) =
            r.map_err(|e| store_err("Failed to read vector record row", e))?;
        out.push(VectorRecord {
            chunk_id,
            ordinal,
            text,
            metadata: DocumentMetadata {
                source,
                policy_type,
            },
            embedding: decode_embedding(&blob)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_survive_the_blob_encoding() {
        let v = vec![0.25f32, -1.5, 3.0e-7, f32::MAX];
        assert_eq!(decode_embedding(&encode_embedding(&v)).unwrap(), v);
        assert!(decode_embedding(&[0u8, 1, 2]).is_err());
    }
}
