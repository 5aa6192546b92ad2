use anyhow::{Context, Result};
use rag_core::RetrievedChunk;
use std::sync::Arc;

use crate::llm::metrics::{MetricsTimer, QueryMetrics};
use crate::llm::{LanguageModel, QaPromptFormatter, Retriever};

/// Answer to a question, with the chunks it was conditioned on
#[derive(Debug, Clone)]
pub struct QaResponse {
    pub result: String,
    pub source_documents: Vec<RetrievedChunk>,
    pub metrics: QueryMetrics,
}

/// Retrieval-augmented question answering.
///
/// For each question it:
/// 1. Retrieves the top-k chunks
/// 2. Stuffs them into a single prompt as context
/// 3. Calls the LLM and returns its answer with the sources
pub struct RetrievalQa {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
}

impl RetrievalQa {
    pub fn new(retriever: Retriever, llm: Arc<dyn LanguageModel>) -> Self {
        tracing::info!(
            "Initializing retrieval QA: model={}, top_k={}",
            llm.model(),
            retriever.top_k()
        );

        Self { retriever, llm }
    }

    /// Answer one question
    pub async fn invoke(&self, query: &str) -> Result<QaResponse> {
        let mut metrics = QueryMetrics::new();

        let source_documents = self
            .retriever
            .retrieve_with_metrics(query, &mut metrics)
            .await
            .context("Retrieval failed")?;

        if source_documents.is_empty() {
            tracing::warn!("No chunks retrieved, asking the model without context");
        }

        let messages = QaPromptFormatter::format_messages(query, &source_documents);

        let timer = MetricsTimer::start();
        let response = self
            .llm
            .complete(&messages)
            .await
            .context("Answer generation failed")?;
        metrics.set_llm_latency(timer.stop());
        metrics.tokens_used = response.tokens_used;

        metrics.report();

        Ok(QaResponse {
            result: response.text,
            source_documents,
            metrics,
        })
    }
}
