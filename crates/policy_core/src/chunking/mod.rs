use std::collections::VecDeque;

use tracing::info;

use crate::domain::{Chunk, PolicyDocument};
use crate::error::AppError;

/// Coarsest to finest. The empty separator means "split into single characters".
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter.
///
/// Text is cut at the coarsest separator present, pieces are merged greedily up to
/// `chunk_size` characters, and pieces that are still too long are split again with
/// the next finer separator. When a chunk is emitted, the trailing pieces totalling at
/// most `chunk_overlap` characters are carried into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::new(
                "VALIDATION_CHUNK_SIZE",
                "Chunk size must be positive",
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::new(
                "VALIDATION_CHUNK_OVERLAP",
                "Chunk overlap must be smaller than chunk size",
            )
            .with_details(format!("chunk_size={chunk_size}; chunk_overlap={chunk_overlap}")));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Split every document; each chunk inherits its parent's metadata.
    pub fn split_documents(&self, documents: &[PolicyDocument]) -> Vec<Chunk> {
        let mut out = Vec::new();
        let mut ordinal: u32 = 0;
        for doc in documents {
            for text in self.split_text(&doc.text) {
                out.push(Chunk {
                    ordinal,
                    text,
                    metadata: doc.metadata.clone(),
                });
                ordinal += 1;
            }
        }
        info!(
            documents = documents.len(),
            chunks = out.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "Chunked policy documents"
        );
        out
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = s;
                break;
            }
            if text.contains(s) {
                separator = s;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window) {
                    out.push(chunk);
                }
                // Keep the tail of what was just emitted as the next chunk's overlap.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(first) => total -= char_len(first),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(&window) {
            out.push(chunk);
        }
        out
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `sep`, attaching each separator to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, ch)| &text[i..i + ch.len_utf8()])
            .collect();
    }
    let mut out = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(sep) {
        out.push(&text[start..idx]);
        start = idx;
    }
    out.push(&text[start..]);
    out.retain(|p| !p.is_empty());
    out
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
