pub mod document;

// Re-export common types
pub use document::{Chunk, ChunkMetadata, Document, RetrievedChunk};

/// Embedding vector produced for a chunk or a query
pub type Embedding = Vec<f32>;
