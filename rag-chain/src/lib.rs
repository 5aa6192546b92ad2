pub mod llm;
pub mod qa;

// Re-export commonly used items from llm module
pub use llm::{
    ApiCredential, ChatMessage, ChatRole, LanguageModel, LlmClient, LlmConfig, LlmProvider,
    LlmResponse, QaPromptFormatter, QueryMetrics, Retriever,
};

// Re-export commonly used items from qa module
pub use qa::{QaResponse, RetrievalQa};
