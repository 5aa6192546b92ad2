use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use rag_core::{Embedding, RagError};
use std::path::PathBuf;

/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// Maps text to fixed-length vectors.
///
/// Implementations must be deterministic: identical input text always yields
/// the same vector for a given model.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in the same order
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    /// Embed a single text
    fn embed_one(&self, text: &str) -> Result<Embedding> {
        self.embed(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Failed to generate embedding".to_string()).into())
    }
}

/// Sentence-transformer embeddings via fastembed (ONNX runtime)
pub struct FastEmbedder {
    model: TextEmbedding,
}

impl FastEmbedder {
    /// Load all-MiniLM-L6-v2, downloading it into `cache_dir` on first use
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        tracing::info!("Loading embedding model (all-MiniLM-L6-v2)...");

        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| RagError::Embedding(format!("Failed to load model: {}", e)))?;

        tracing::info!("Embedding model loaded");
        Ok(Self { model })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let expected = texts.len();
        let embeddings = self
            .model
            .embed(texts, None)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if embeddings.len() != expected {
            return Err(anyhow!(
                "Embedding model returned {} vectors for {} inputs",
                embeddings.len(),
                expected
            ));
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn model_name(&self) -> &str {
        "sentence-transformers/all-MiniLM-L6-v2"
    }
}

/// Lexical feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into a fixed number of
/// buckets and the counts are L2-normalised. Needs no model download, so it
/// serves offline runs and tests. Texts sharing words land close together.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(MINILM_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

fn fnv1a(token: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    token
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}
