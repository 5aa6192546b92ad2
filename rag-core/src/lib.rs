pub mod error;
pub mod types;

// Re-export common types
pub use error::RagError;
pub use types::{Chunk, ChunkMetadata, Document, Embedding, RetrievedChunk};
