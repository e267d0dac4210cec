use std::sync::Arc;

use policy_core::error::AppError;
use tracing::debug;

use crate::llm::Llm;
use crate::store::{ScoredChunk, VectorStore};

pub mod prompts;

pub use prompts::{render_prompt, PromptInput, HISTORY_REFUSAL, NO_ANSWER, OPINION_REFUSAL};

/// Retrieval-augmented answering over a ready vector store.
///
/// Holds no per-question state: every call retrieves, renders and generates from
/// scratch, so one engine can serve any number of concurrent callers.
pub struct AnswerEngine {
    store: Arc<VectorStore>,
    llm: Arc<dyn Llm>,
    model: String,
    top_k: usize,
}

impl std::fmt::Debug for AnswerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("store", &self.store)
            .field("model", &self.model)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl AnswerEngine {
    pub fn new(store: Arc<VectorStore>, llm: Arc<dyn Llm>, model: &str, top_k: usize) -> Self {
        Self {
            store,
            llm,
            model: model.to_string(),
            top_k,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The chunks that would be placed in the prompt for `question`, best first.
    pub fn retrieve_context(&self, question: &str) -> Result<Vec<ScoredChunk>, AppError> {
        self.store.similarity_search(question, self.top_k)
    }

    /// Answer one question from retrieved policy text.
    ///
    /// Returns [`NO_ANSWER`] without calling the model when retrieval finds nothing.
    pub fn answer(&self, question: &str) -> Result<String, AppError> {
        let hits = self.retrieve_context(question)?;
        if hits.is_empty() {
            debug!("No chunks retrieved; returning fallback answer");
            return Ok(NO_ANSWER.to_string());
        }

        let context = build_context(&hits);
        let prompt = render_prompt(&PromptInput {
            context: &context,
            question,
        })?;

        let answer = self.llm.generate(&self.model, &prompt)?;
        debug!(
            hits = hits.len(),
            prompt_chars = prompt.chars().count(),
            answer_chars = answer.chars().count(),
            "Answered question"
        );
        Ok(answer)
    }
}

/// Chunk texts in retrieval order, separated by a blank line.
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
