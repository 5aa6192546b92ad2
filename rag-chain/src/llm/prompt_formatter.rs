use rag_core::RetrievedChunk;

/// Instructions placed ahead of the retrieved context
const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
}

/// One message of a chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Formatter for question-answering prompts
pub struct QaPromptFormatter;

impl QaPromptFormatter {
    /// Retrieved chunk texts, in rank order, separated by blank lines
    pub fn format_context(chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// System message carrying the context, followed by the user's question
    pub fn format_messages(question: &str, chunks: &[RetrievedChunk]) -> Vec<ChatMessage> {
        let mut system = String::from(SYSTEM_TEMPLATE);
        system.push_str(&Self::format_context(chunks));

        vec![ChatMessage::system(system), ChatMessage::user(question)]
    }
}
