//! End-to-end tests for retrieval QA with an offline embedder and a scripted
//! language model.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rag_chain::{ChatMessage, ChatRole, LanguageModel, LlmResponse, RetrievalQa, Retriever};
use rag_core::{Chunk, ChunkMetadata};
use rag_data_services::{Embedder, HashingEmbedder, VectorStore};
use std::sync::{Arc, Mutex};

/// Records every prompt and replies with a fixed answer (or fails)
struct ScriptedModel {
    answer: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        match &self.answer {
            Some(text) => Ok(LlmResponse {
                text: text.clone(),
                model: "scripted".to_string(),
                tokens_used: Some(42),
            }),
            None => Err(anyhow!("LLM error: 401 invalid api key")),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

async fn seeded_store(dir: &std::path::Path, texts: &[&str]) -> Arc<VectorStore> {
    let embedder = HashingEmbedder::default();
    let store = VectorStore::local(dir, "collections").unwrap();
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            Chunk::new(
                *t,
                ChunkMetadata {
                    source: format!("doc{}.docx", i),
                    chunk_index: 0,
                    start_index: 0,
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

fn qa(store: Arc<VectorStore>, model: Arc<ScriptedModel>) -> RetrievalQa {
    let retriever = Retriever::new(Arc::new(HashingEmbedder::default()), store, 4);
    RetrievalQa::new(retriever, model)
}

#[tokio::test]
async fn test_answer_uses_retrieved_context() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(
        dir.path(),
        &[
            "The warranty covers manufacturing defects for two years.",
            "Shipping is free on orders over fifty dollars.",
            "Returns are accepted within thirty days.",
            "Gift cards never expire.",
            "Support is available on weekdays.",
        ],
    )
    .await;
    let model = Arc::new(ScriptedModel::answering("Two years."));

    let response = qa(store, model.clone())
        .invoke("How long does the warranty cover defects?")
        .await
        .unwrap();

    assert_eq!(response.result, "Two years.");
    assert_eq!(response.source_documents.len(), 4);
    assert!(response.source_documents[0]
        .chunk
        .text
        .starts_with("The warranty covers"));
    assert_eq!(response.metrics.num_matches, 4);
    assert_eq!(response.metrics.tokens_used, Some(42));

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let messages = &prompts[0];
    assert_eq!(messages[0].role, ChatRole::System);
    assert!(messages[0]
        .content
        .contains("The warranty covers manufacturing defects for two years."));
    assert_eq!(
        messages[1],
        ChatMessage::user("How long does the warranty cover defects?")
    );
}

#[tokio::test]
async fn test_empty_store_still_answers_without_sources() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(VectorStore::local(dir.path(), "collections").unwrap());
    let model = Arc::new(ScriptedModel::answering("I don't know."));

    let response = qa(store, model).invoke("What is the refund policy?").await.unwrap();

    assert_eq!(response.result, "I don't know.");
    assert!(response.source_documents.is_empty());
}

#[tokio::test]
async fn test_llm_failure_surfaces_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path(), &["Anything at all."]).await;

    let err = qa(store, Arc::new(ScriptedModel::failing()))
        .invoke("Question?")
        .await
        .unwrap_err();

    let rendered = format!("{:#}", err);
    assert!(rendered.contains("Answer generation failed"));
    assert!(rendered.contains("invalid api key"));
}
