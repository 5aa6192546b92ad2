pub mod rag;

// Re-export commonly used items
pub use rag::{
    DocumentLoader, Embedder, EmbedderKind, FastEmbedder, HashingEmbedder, IngestConfig,
    IngestStats, IngestionPipeline, LoadReport, LocalVectorStore, QdrantVectorStore,
    RecursiveTextSplitter, SplitterConfig, VectorStore,
};
