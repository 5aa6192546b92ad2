use rag_chain::llm::llm_client::GROQ_API_KEY_VAR;
use rag_chain::llm::retriever::DEFAULT_TOP_K;
use rag_chain::LlmConfig;
use rag_data_services::IngestConfig;

/// Chat application configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub ingest: IngestConfig,
    pub llm: LlmConfig,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Answer from the existing collection without re-ingesting
    pub skip_ingest: bool,
    /// Print the retrieved chunks under each answer
    pub show_sources: bool,
    /// Environment variable holding the LLM API key
    pub api_key_env: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            llm: LlmConfig::default(),
            top_k: DEFAULT_TOP_K,
            skip_ingest: false,
            show_sources: false,
            api_key_env: GROQ_API_KEY_VAR.to_string(),
        }
    }
}
