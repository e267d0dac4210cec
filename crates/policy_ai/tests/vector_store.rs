use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use policy_ai::embeddings::Embedder;
use policy_ai::store::VectorStore;
use policy_core::domain::{Chunk, DocumentMetadata};
use policy_core::error::AppError;

/// Counts of `a` and `b` characters.
struct CountABEmbedder {
    calls: AtomicUsize,
}

impl CountABEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountABEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let a = input.chars().filter(|c| *c == 'a').count();
        let b = input.chars().filter(|c| *c == 'b').count();
        Ok(vec![a as f32, b as f32])
    }
}

/// Vector length equals input length.
struct RaggedEmbedder;

impl Embedder for RaggedEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        Ok(vec![1.0; input.len()])
    }
}

struct ThreeDimEmbedder;

impl Embedder for ThreeDimEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        Ok(vec![1.0, 1.0, 1.0])
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        Err(AppError::new("OLLAMA_UNREACHABLE", "down").with_retryable(true))
    }
}

fn chunks(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk {
            ordinal: i as u32,
            text: t.to_string(),
            metadata: DocumentMetadata {
                source: "data/policies/ab_policy.txt".to_string(),
                policy_type: "Ab Policy".to_string(),
            },
        })
        .collect()
}

const BUILT_AT: &str = "2026-10-19T00:00:00Z";

#[test]
fn build_persists_and_open_restores_the_same_records() {
    let tmp = tempdir().unwrap();
    let embedder = Arc::new(CountABEmbedder::new());
    let input = chunks(&["aaaa", "bbbb", "aabb"]);

    let built = VectorStore::build(tmp.path(), embedder.clone(), "mock", &input, BUILT_AT)
        .expect("build");
    assert_eq!(embedder.call_count(), 3);
    assert_eq!(built.len(), 3);
    assert_eq!(built.status().dims, Some(2));
    assert!(tmp.path().join("vectors.sqlite").exists());

    let reopened = VectorStore::open(tmp.path(), embedder.clone()).expect("open");
    assert_eq!(reopened.status(), built.status());
    assert_eq!(reopened.records(), built.records());
    // Reopening never re-embeds.
    assert_eq!(embedder.call_count(), 3);
}

#[test]
fn rebuilding_replaces_previous_contents() {
    let tmp = tempdir().unwrap();
    let embedder = Arc::new(CountABEmbedder::new());

    VectorStore::build(
        tmp.path(),
        embedder.clone(),
        "mock",
        &chunks(&["aaaa", "bbbb", "aabb"]),
        BUILT_AT,
    )
    .expect("first build");
    VectorStore::build(tmp.path(), embedder.clone(), "mock", &chunks(&["ab"]), BUILT_AT)
        .expect("second build");

    let reopened = VectorStore::open(tmp.path(), embedder).expect("open");
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.records()[0].text, "ab");
}

#[test]
fn identical_input_yields_identical_stores() {
    let embedder = Arc::new(CountABEmbedder::new());
    let input = chunks(&["aaab", "abbb", "ab ab ab"]);

    let t1 = tempdir().unwrap();
    let t2 = tempdir().unwrap();
    let s1 = VectorStore::build(t1.path(), embedder.clone(), "mock", &input, BUILT_AT).unwrap();
    let s2 = VectorStore::build(t2.path(), embedder, "mock", &input, BUILT_AT).unwrap();
    assert_eq!(s1.records(), s2.records());
}

#[test]
fn search_ranks_by_cosine_and_breaks_ties_by_position() {
    let tmp = tempdir().unwrap();
    let embedder = Arc::new(CountABEmbedder::new());
    let store = VectorStore::build(
        tmp.path(),
        embedder,
        "mock",
        &chunks(&["bbbb", "aaaa", "ab", "aa", "aabb"]),
        BUILT_AT,
    )
    .unwrap();

    let hits = store.similarity_search("aaa", 3).expect("search");
    let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    // "aaaa" and "aa" are both parallel to the query; the earlier one wins the tie.
    assert_eq!(texts, vec!["aaaa", "aa", "ab"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits[1].score >= hits[2].score);
    assert_eq!(hits[0].metadata.policy_type, "Ab Policy");

    assert_eq!(store.similarity_search("aaa", 50).unwrap().len(), 5);
    assert!(store.similarity_search("aaa", 0).unwrap().is_empty());
}

#[test]
fn empty_store_searches_to_nothing() {
    let tmp = tempdir().unwrap();
    let embedder = Arc::new(CountABEmbedder::new());
    let store = VectorStore::build(tmp.path(), embedder.clone(), "mock", &[], BUILT_AT).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.status().dims, None);

    let reopened = VectorStore::open(tmp.path(), embedder.clone()).unwrap();
    assert!(reopened.similarity_search("anything", 15).unwrap().is_empty());
    assert_eq!(embedder.call_count(), 0);
}

#[test]
fn build_rejects_inconsistent_dimensions() {
    let tmp = tempdir().unwrap();
    let err = VectorStore::build(
        tmp.path(),
        Arc::new(RaggedEmbedder),
        "mock",
        &chunks(&["short", "much longer text"]),
        BUILT_AT,
    )
    .unwrap_err();
    assert_eq!(err.code, "INDEX_EMBEDDING_DIMS_MISMATCH");
    assert!(!tmp.path().join("vectors.sqlite").exists());
}

#[test]
fn build_wraps_embedder_failures() {
    let tmp = tempdir().unwrap();
    let err = VectorStore::build(
        tmp.path(),
        Arc::new(FailingEmbedder),
        "mock",
        &chunks(&["aaaa"]),
        BUILT_AT,
    )
    .unwrap_err();
    assert_eq!(err.code, "INDEX_EMBEDDINGS_FAILED");
    assert!(err.retryable);
}

#[test]
fn open_requires_a_built_store() {
    let tmp = tempdir().unwrap();
    let err = VectorStore::open(&tmp.path().join("missing"), Arc::new(CountABEmbedder::new()))
        .unwrap_err();
    assert_eq!(err.code, "INDEX_NOT_READY");
}

#[test]
fn query_must_match_index_dimensions() {
    let tmp = tempdir().unwrap();
    VectorStore::build(
        tmp.path(),
        Arc::new(CountABEmbedder::new()),
        "mock",
        &chunks(&["aaaa"]),
        BUILT_AT,
    )
    .unwrap();

    let store = VectorStore::open(tmp.path(), Arc::new(ThreeDimEmbedder)).unwrap();
    let err = store.similarity_search("aaaa", 1).unwrap_err();
    assert_eq!(err.code, "INDEX_QUERY_DIMS_MISMATCH");
}

#[test]
fn zero_query_vector_is_rejected() {
    let tmp = tempdir().unwrap();
    let store = VectorStore::build(
        tmp.path(),
        Arc::new(CountABEmbedder::new()),
        "mock",
        &chunks(&["aaaa"]),
        BUILT_AT,
    )
    .unwrap();
    let err = store.similarity_search("xyz", 1).unwrap_err();
    assert_eq!(err.code, "INDEX_QUERY_EMBEDDING_ZERO");
}
