use anyhow::{Context, Result};
use rag_core::RagError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use super::document_loader::DocumentLoader;
use super::embedder::{Embedder, FastEmbedder, HashingEmbedder, MINILM_DIMENSION};
use super::ingestion_pipeline::IngestionPipeline;
use super::text_splitter::{RecursiveTextSplitter, SplitterConfig};
use super::vector_store::VectorStore;

/// Which embedding model to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// all-MiniLM-L6-v2 through fastembed (downloads the model once)
    FastEmbed,
    /// Offline feature hashing
    Hashing,
}

impl EmbedderKind {
    /// Both kinds produce MiniLM-sized vectors
    pub fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedderKind::FastEmbed => write!(f, "fastembed"),
            EmbedderKind::Hashing => write!(f, "hashing"),
        }
    }
}

impl FromStr for EmbedderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" | "minilm" => Ok(EmbedderKind::FastEmbed),
            "hashing" => Ok(EmbedderKind::Hashing),
            other => Err(RagError::InvalidConfig(format!(
                "unknown embedder '{}', expected 'fastembed' or 'hashing'",
                other
            ))),
        }
    }
}

/// Everything needed to build the ingestion side of the system
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub documents_dir: PathBuf,
    pub glob: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub persist_dir: PathBuf,
    pub collection: String,
    /// Use Qdrant at this URL instead of the local persistence directory
    pub qdrant_url: Option<String>,
    pub embedder: EmbedderKind,
    pub model_cache_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let splitter = SplitterConfig::default();
        Self {
            documents_dir: PathBuf::from("documents"),
            glob: "**/*.docx".to_string(),
            chunk_size: splitter.chunk_size,
            chunk_overlap: splitter.chunk_overlap,
            persist_dir: PathBuf::from("chroma-db"),
            collection: "collections".to_string(),
            qdrant_url: None,
            embedder: EmbedderKind::FastEmbed,
            model_cache_dir: None,
        }
    }
}

impl IngestConfig {
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            ..Default::default()
        }
    }

    /// Fail early when the documents directory is absent
    pub fn check_documents_dir(&self) -> Result<(), RagError> {
        if self.documents_dir.is_dir() {
            Ok(())
        } else {
            Err(RagError::DocumentsDirMissing(self.documents_dir.clone()))
        }
    }

    /// Open the configured backend. Local collections are created on first write.
    pub async fn open_vector_store(&self) -> Result<Arc<VectorStore>> {
        let store = match &self.qdrant_url {
            Some(url) => VectorStore::qdrant(url, &self.collection, self.embedder.dimension())
                .await
                .context("Failed to connect to Qdrant")?,
            None => VectorStore::local(self.persist_dir.clone(), &self.collection)
                .context("Failed to open local vector store")?,
        };

        tracing::info!("Vector store ready: {}", store.describe());
        Ok(Arc::new(store))
    }

    pub fn load_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match self.embedder {
            EmbedderKind::FastEmbed => Arc::new(
                FastEmbedder::new(self.model_cache_dir.clone())
                    .context("Failed to initialize embedding model")?,
            ),
            EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
        };

        tracing::info!(
            "Embedder ready: {} ({} dims)",
            embedder.model_name(),
            embedder.dimension()
        );
        Ok(embedder)
    }

    pub fn build_pipeline(
        &self,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<VectorStore>,
    ) -> Result<IngestionPipeline> {
        let loader = DocumentLoader::new(self.documents_dir.clone(), &self.glob)?;
        let splitter = RecursiveTextSplitter::new(self.splitter_config())?;

        Ok(IngestionPipeline::new(
            loader,
            splitter,
            embedder,
            vector_store,
        ))
    }
}
