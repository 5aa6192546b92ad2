use anyhow::{Context, Result};
use rag_core::{Chunk, Document};
use std::sync::Arc;
use uuid::Uuid;

use super::document_loader::DocumentLoader;
use super::embedder::Embedder;
use super::text_splitter::RecursiveTextSplitter;
use super::vector_store::VectorStore;

/// Chunks embedded per model call
const BATCH_SIZE: usize = 100;

/// Statistics from an ingestion run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    pub documents_loaded: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub points_added: usize,
    /// Chunks already present in the collection
    pub points_skipped: usize,
}

/// Ingestion pipeline that:
/// 1. Loads documents from disk
/// 2. Splits them into overlapping chunks
/// 3. Generates embeddings
/// 4. Stores chunks and vectors in the vector store
pub struct IngestionPipeline {
    loader: DocumentLoader,
    splitter: RecursiveTextSplitter,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        loader: DocumentLoader,
        splitter: RecursiveTextSplitter,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<VectorStore>,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
            vector_store,
        }
    }

    /// Load, split, embed and store everything under the documents directory.
    ///
    /// Files that fail to load are counted and skipped. A missing documents
    /// directory and embedding or storage failures abort the run.
    pub async fn run(&self) -> Result<IngestStats> {
        tracing::info!(
            "Starting ingestion from {} into {}",
            self.loader.root().display(),
            self.vector_store.describe()
        );

        let report = self.loader.load()?;

        for failure in &report.failures {
            tracing::warn!("{}", failure);
        }

        let mut stats = self.ingest_documents(&report.documents).await?;
        stats.documents_failed = report.failures.len();

        tracing::info!("Ingestion complete: {:?}", stats);
        Ok(stats)
    }

    /// Split, embed and store already loaded documents
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestStats> {
        let mut stats = IngestStats {
            documents_loaded: documents.len(),
            ..Default::default()
        };

        self.vector_store
            .ensure_model(self.embedder.model_name())
            .await?;

        // Step 1: Split into chunks
        let chunks = self.splitter.split_documents(documents);
        stats.chunks_created = chunks.len();
        tracing::info!(
            "Created {} chunks from {} documents",
            chunks.len(),
            documents.len()
        );

        if chunks.is_empty() {
            tracing::warn!("No chunks created, nothing to store");
            return Ok(stats);
        }

        // Step 2: Embed and store in batches
        for batch in chunks.chunks(BATCH_SIZE) {
            let added = self.ingest_batch(batch, &mut stats).await?;
            stats.points_added += added;
            stats.points_skipped += batch.len() - added.min(batch.len());
        }

        Ok(stats)
    }

    /// Embed and store the chunks of `batch` that are not stored yet
    async fn ingest_batch(&self, batch: &[Chunk], stats: &mut IngestStats) -> Result<usize> {
        let ids: Vec<Uuid> = batch.iter().map(Chunk::id).collect();
        let existing = self
            .vector_store
            .existing_ids(&ids)
            .await
            .context("Failed to check stored chunks")?;

        let new_chunks: Vec<Chunk> = batch
            .iter()
            .zip(&ids)
            .filter(|(_, id)| !existing.contains(*id))
            .map(|(chunk, _)| chunk.clone())
            .collect();

        if new_chunks.is_empty() {
            tracing::debug!("All {} chunks in batch already stored", batch.len());
            return Ok(0);
        }

        let texts: Vec<String> = new_chunks.iter().map(|c| c.text.clone()).collect();

        tracing::debug!(
            "Generating embeddings for {} of {} chunks...",
            texts.len(),
            batch.len()
        );

        let embeddings = self
            .embedder
            .embed(texts)
            .with_context(|| format!("Embedding failed ({})", self.embedder.model_name()))?;
        stats.embeddings_generated += embeddings.len();

        let added = self
            .vector_store
            .add(&new_chunks, embeddings)
            .await
            .context("Failed to store chunks")?;

        tracing::debug!(
            "Processed {} embeddings (total: {}), {} new",
            new_chunks.len(),
            stats.embeddings_generated,
            added
        );

        Ok(added)
    }
}
