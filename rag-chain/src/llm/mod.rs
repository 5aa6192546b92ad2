pub mod retriever;
pub mod prompt_formatter;
pub mod llm_client;
pub mod metrics;

// Re-export commonly used items
pub use retriever::Retriever;
pub use prompt_formatter::{ChatMessage, ChatRole, QaPromptFormatter};
pub use llm_client::{ApiCredential, LanguageModel, LlmClient, LlmConfig, LlmProvider, LlmResponse};
pub use metrics::QueryMetrics;
