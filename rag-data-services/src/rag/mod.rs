pub mod document_loader;
pub mod text_splitter;
pub mod embedder;
pub mod local_store;
pub mod vector_store;
pub mod ingestion_pipeline;
pub mod ingest_config;

// Re-export commonly used items
pub use document_loader::{DocumentLoader, LoadReport};
pub use text_splitter::{RecursiveTextSplitter, SplitterConfig};
pub use embedder::{Embedder, FastEmbedder, HashingEmbedder};
pub use local_store::LocalVectorStore;
pub use vector_store::{QdrantVectorStore, VectorStore};
pub use ingestion_pipeline::{IngestStats, IngestionPipeline};
pub use ingest_config::{EmbedderKind, IngestConfig};
