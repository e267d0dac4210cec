pub mod answer;
pub mod embeddings;
pub mod llm;
pub mod ollama;
pub mod store;
