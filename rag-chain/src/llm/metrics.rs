//! Per-query metrics
//!
//! Tracks, for each answered question:
//! - Query embedding latency
//! - Vector store retrieval latency
//! - LLM inference latency
//! - Similarity of the retrieved chunks

use std::time::{Duration, Instant};

/// Metrics for one retrieval + generation round
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    /// Time taken to search the vector store (milliseconds)
    pub retrieval_latency_ms: u64,

    /// Time taken to embed the query (milliseconds)
    pub embedding_latency_ms: u64,

    /// Time taken for the LLM to generate the answer (milliseconds)
    pub llm_latency_ms: u64,

    /// Similarity scores of all retrieved chunks, in rank order
    pub similarity_scores: Vec<f32>,

    pub similarity_min: Option<f32>,

    pub similarity_max: Option<f32>,

    /// Number of chunks retrieved
    pub num_matches: usize,

    /// Total tokens reported by the provider
    pub tokens_used: Option<u32>,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_retrieval_latency(&mut self, duration: Duration) {
        self.retrieval_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_embedding_latency(&mut self, duration: Duration) {
        self.embedding_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_llm_latency(&mut self, duration: Duration) {
        self.llm_latency_ms = duration.as_millis() as u64;
    }

    /// Record similarity scores and compute min/max
    pub fn set_similarity_scores(&mut self, scores: Vec<f32>) {
        if scores.is_empty() {
            self.similarity_min = None;
            self.similarity_max = None;
            self.num_matches = 0;
        } else {
            self.similarity_min = scores.iter().copied().min_by(|a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            });
            self.similarity_max = scores.iter().copied().max_by(|a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            });
            self.num_matches = scores.len();
        }
        self.similarity_scores = scores;
    }

    pub fn avg_similarity(&self) -> f32 {
        if self.similarity_scores.is_empty() {
            0.0
        } else {
            self.similarity_scores.iter().sum::<f32>() / self.similarity_scores.len() as f32
        }
    }

    /// Embedding + retrieval + LLM
    pub fn total_latency_ms(&self) -> u64 {
        self.retrieval_latency_ms + self.embedding_latency_ms + self.llm_latency_ms
    }

    /// Report metrics to tracing logs
    pub fn report(&self) {
        tracing::info!(
            "Query metrics: embedding={}ms, retrieval={}ms, llm={}ms, total={}ms, matches={}, avg_sim={:.2}, sim_range=[{:?},{:?}], tokens={:?}",
            self.embedding_latency_ms,
            self.retrieval_latency_ms,
            self.llm_latency_ms,
            self.total_latency_ms(),
            self.num_matches,
            self.avg_similarity(),
            self.similarity_min,
            self.similarity_max,
            self.tokens_used,
        );
    }
}

/// Timer helper for measuring operation latency
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}
