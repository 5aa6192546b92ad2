use anyhow::{Context, Result};
use rag_chain::{ApiCredential, LanguageModel, LlmClient, RetrievalQa, Retriever};
use rag_core::RagError;
use std::sync::Arc;

use crate::config::ChatConfig;

/// State shared by every iteration of the chat loop, built once at startup
pub struct AppContext {
    pub qa: RetrievalQa,
    pub config: ChatConfig,
}

impl AppContext {
    /// Build the full application against the configured LLM provider.
    ///
    /// The credential is resolved first so a missing key fails before any
    /// model download, ingestion or network call.
    pub async fn build(config: ChatConfig) -> Result<Self> {
        let credential = ApiCredential::from_env(&config.api_key_env)?;
        tracing::info!("Using API key from {}", credential.env_var());

        let retriever = prepare_retriever(&config).await?;

        let llm = LlmClient::new(config.llm.clone(), &credential)
            .context("Failed to initialize LLM client")?;

        Ok(Self {
            qa: RetrievalQa::new(retriever, Arc::new(llm)),
            config,
        })
    }

    /// Build with a caller-supplied language model and no credential lookup
    pub async fn build_with_model(config: ChatConfig, llm: Arc<dyn LanguageModel>) -> Result<Self> {
        let retriever = prepare_retriever(&config).await?;

        Ok(Self {
            qa: RetrievalQa::new(retriever, llm),
            config,
        })
    }
}

/// Process exit code for a startup failure: 2 for configuration errors,
/// 1 for anything else
pub fn startup_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RagError>() {
        Some(rag_err) if rag_err.is_fatal() => 2,
        _ => 1,
    }
}

/// Check inputs, open the store, load the embedder and ingest
async fn prepare_retriever(config: &ChatConfig) -> Result<Retriever> {
    tracing::info!("Initializing RAG components...");

    config.ingest.check_documents_dir()?;

    let vector_store = config.ingest.open_vector_store().await?;
    let embedder = config.ingest.load_embedder()?;

    if config.skip_ingest {
        tracing::info!(
            "Skipping ingestion, {} points in collection",
            vector_store.count().await?
        );
    } else {
        let stats = config
            .ingest
            .build_pipeline(Arc::clone(&embedder), Arc::clone(&vector_store))?
            .run()
            .await
            .context("Document ingestion failed")?;

        tracing::info!(
            "Ingested {} documents ({} failed): {} chunks, {} new, {} already stored",
            stats.documents_loaded,
            stats.documents_failed,
            stats.chunks_created,
            stats.points_added,
            stats.points_skipped
        );
    }

    tracing::info!("✅ RAG components initialized successfully");

    Ok(Retriever::new(embedder, vector_store, config.top_k))
}
