use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use policy_core::config::{
    Settings, DEFAULT_ANSWER_TIMEOUT_SECS, DEFAULT_BIND_ADDR, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_DOCS_DIR, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_PERSIST_DIR, DEFAULT_TOP_K,
};

#[derive(Debug, Parser)]
#[command(
    name = "policyassistant",
    version,
    about = "Answer questions about company policy documents"
)]
pub struct Cli {
    #[command(flatten)]
    pub options: PipelineOptions,

    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Build (or reopen) the index and serve the HTTP API.
    Serve,
    /// Build (or reopen) the index and answer questions typed on stdin.
    Chat {
        /// Print the retrieved chunks before each answer.
        #[arg(long)]
        show_context: bool,
    },
    /// Build the persisted index and exit.
    Index,
}

#[derive(Debug, Clone, Args)]
pub struct PipelineOptions {
    /// Directory of `.txt` policy documents.
    #[arg(long, global = true, env = "POLICY_ASSISTANT_DOCS_DIR", default_value = DEFAULT_DOCS_DIR)]
    pub docs_dir: PathBuf,

    /// Where the vector store is persisted.
    #[arg(long, global = true, env = "POLICY_ASSISTANT_PERSIST_DIR", default_value = DEFAULT_PERSIST_DIR)]
    pub persist_dir: PathBuf,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    pub llm_model: String,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, global = true, env = "POLICY_ASSISTANT_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long, global = true, env = "POLICY_ASSISTANT_BIND", default_value = DEFAULT_BIND_ADDR)]
    pub bind: String,

    /// Upper bound on one answer, in seconds.
    #[arg(long, global = true, env = "POLICY_ASSISTANT_ANSWER_TIMEOUT_SECS", default_value_t = DEFAULT_ANSWER_TIMEOUT_SECS)]
    pub answer_timeout_secs: u64,

    /// Reopen the persisted vector store instead of rebuilding it from the documents.
    #[arg(long, global = true, env = "POLICY_ASSISTANT_REUSE_INDEX")]
    pub reuse_index: bool,
}

impl Cli {
    pub fn action(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    pub fn settings(&self) -> Settings {
        let o = &self.options;
        Settings {
            docs_dir: o.docs_dir.clone(),
            persist_dir: o.persist_dir.clone(),
            ollama_url: o.ollama_url.clone(),
            embedding_model: o.embedding_model.clone(),
            llm_model: o.llm_model.clone(),
            temperature: o.temperature,
            chunk_size: o.chunk_size,
            chunk_overlap: o.chunk_overlap,
            top_k: o.top_k,
            bind_addr: o.bind.clone(),
            answer_timeout_secs: o.answer_timeout_secs,
            reuse_index: o.reuse_index,
        }
    }
}
