use anyhow::{Context, Result};
use moka::future::Cache;
use rag_core::{Embedding, RetrievedChunk};
use rag_data_services::{Embedder, VectorStore};
use std::sync::Arc;

use super::metrics::{MetricsTimer, QueryMetrics};

/// Number of chunks handed to the LLM per question
pub const DEFAULT_TOP_K: usize = 4;

/// Query embeddings kept in memory
const QUERY_CACHE_CAPACITY: u64 = 256;

/// Embeds a question with the ingestion embedder and returns the top-k
/// nearest stored chunks. No re-ranking, no filtering.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<VectorStore>,
    top_k: usize,
    query_cache: Cache<String, Arc<Embedding>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<VectorStore>, top_k: usize) -> Self {
        tracing::info!(
            "Initializing retriever: model={}, top_k={}, store={}",
            embedder.model_name(),
            top_k,
            vector_store.describe()
        );

        Self {
            embedder,
            vector_store,
            top_k,
            query_cache: Cache::new(QUERY_CACHE_CAPACITY),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-k chunks for `query`, closest first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let mut metrics = QueryMetrics::new();
        self.retrieve_with_metrics(query, &mut metrics).await
    }

    /// Same as [`Retriever::retrieve`], recording latency and similarity
    pub async fn retrieve_with_metrics(
        &self,
        query: &str,
        metrics: &mut QueryMetrics,
    ) -> Result<Vec<RetrievedChunk>> {
        // Stored vectors must come from the same model as the query
        self.vector_store
            .ensure_model(self.embedder.model_name())
            .await?;

        // 1. Embed the query
        let timer = MetricsTimer::start();
        let query_embedding = self.embed_query(query).await?;
        metrics.set_embedding_latency(timer.stop());

        // 2. Nearest-neighbour search
        let timer = MetricsTimer::start();
        let results = self
            .vector_store
            .query(&query_embedding, self.top_k)
            .await
            .context("Vector store query failed")?;
        metrics.set_retrieval_latency(timer.stop());

        metrics.set_similarity_scores(results.iter().map(|r| r.score).collect());

        tracing::debug!(
            "Retrieved {} chunks (top_k={}) for query of {} chars",
            results.len(),
            self.top_k,
            query.chars().count()
        );

        Ok(results)
    }

    async fn embed_query(&self, query: &str) -> Result<Arc<Embedding>> {
        if let Some(cached) = self.query_cache.get(query).await {
            tracing::debug!("Query embedding cache hit");
            return Ok(cached);
        }

        let embedding = Arc::new(
            self.embedder
                .embed_one(query)
                .context("Failed to embed query")?,
        );
        self.query_cache
            .insert(query.to_string(), Arc::clone(&embedding))
            .await;

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::{Chunk, ChunkMetadata};
    use rag_data_services::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the model is actually invoked
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    async fn seeded_store(dir: &std::path::Path, embedder: &dyn Embedder) -> Arc<VectorStore> {
        let store = VectorStore::local(dir, "collections").unwrap();
        let texts = [
            "The office closes at six on Fridays.",
            "Expense reports are due by the fifth of each month.",
            "Visitors must sign in at reception.",
            "The VPN client is required for remote access.",
            "Fire drills happen every quarter.",
            "Printers are on the second floor.",
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Chunk::new(
                    *t,
                    ChunkMetadata {
                        source: "office.docx".to_string(),
                        chunk_index: i,
                        start_index: i * 100,
                    },
                )
            })
            .collect();
        let vectors = embedder
            .embed(texts.iter().map(|t| t.to_string()).collect())
            .unwrap();
        store.add(&chunks, vectors).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_returns_at_most_top_k_ranked() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let store = seeded_store(dir.path(), embedder.as_ref()).await;
        let retriever = Retriever::new(embedder, store, DEFAULT_TOP_K);

        let mut metrics = QueryMetrics::new();
        let results = retriever
            .retrieve_with_metrics("When are expense reports due each month?", &mut metrics)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert!(results[0].chunk.text.starts_with("Expense reports"));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(metrics.num_matches, 4);
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(VectorStore::local(dir.path(), "collections").unwrap());
        let retriever = Retriever::new(Arc::new(HashingEmbedder::default()), store, DEFAULT_TOP_K);

        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collection_from_another_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path(), &HashingEmbedder::default()).await;
        store.ensure_model("feature-hashing").await.unwrap();

        let counting = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::default(),
            calls: AtomicUsize::new(0),
        });
        let retriever = Retriever::new(counting.clone(), store, DEFAULT_TOP_K);

        assert!(retriever.retrieve("printers").await.is_err());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_query_embeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let counting = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::default(),
            calls: AtomicUsize::new(0),
        });
        let store = seeded_store(dir.path(), counting.as_ref()).await;
        let before = counting.calls.load(Ordering::SeqCst);

        let retriever = Retriever::new(counting.clone(), store, 2);
        let first = retriever.retrieve("printers").await.unwrap();
        let second = retriever.retrieve("printers").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counting.calls.load(Ordering::SeqCst) - before, 1);
    }
}
