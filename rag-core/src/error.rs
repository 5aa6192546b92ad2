use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("documents directory not found: {}", .0.display())]
    DocumentsDirMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load {}: {reason}", path.display())]
    DocumentLoad { path: PathBuf, reason: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),
}

impl RagError {
    /// Configuration errors end the process at startup; everything else is
    /// reported per file or per query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::MissingCredential(_)
                | RagError::DocumentsDirMissing(_)
                | RagError::InvalidConfig(_)
        )
    }
}
