use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Raw text extracted from one source file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Extracted text content
    pub text: String,
    /// Path of the file, relative to the documents directory
    pub source: PathBuf,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }

    /// Source path rendered with `/` separators so it is stable across platforms
    pub fn source_key(&self) -> String {
        self.source
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Provenance carried with every chunk into the vector store payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    /// Position of the chunk within its document
    pub chunk_index: usize,
    /// Character offset of the chunk inside the document text
    pub start_index: usize,
}

/// A bounded slice of a document, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Deterministic identifier derived from source, offset and text.
    ///
    /// Re-ingesting an unchanged document yields the same ids, which is what
    /// lets the vector store skip entries it already holds.
    pub fn id(&self) -> Uuid {
        let key = format!(
            "{}\u{0}{}\u{0}{}",
            self.metadata.source, self.metadata.start_index, self.text
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }
}

/// A chunk returned by similarity search together with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is closer)
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, start_index: usize) -> Chunk {
        Chunk::new(
            text,
            ChunkMetadata {
                source: "handbook.docx".to_string(),
                chunk_index: 0,
                start_index,
            },
        )
    }

    #[test]
    fn test_chunk_id_is_stable() {
        assert_eq!(chunk("hello", 0).id(), chunk("hello", 0).id());
    }

    #[test]
    fn test_chunk_id_depends_on_offset_and_text() {
        let base = chunk("hello", 0).id();
        assert_ne!(base, chunk("hello", 10).id());
        assert_ne!(base, chunk("hello!", 0).id());
    }

    #[test]
    fn test_source_key_uses_forward_slashes() {
        let doc = Document::new("text", PathBuf::from("policies").join("leave.docx"));
        assert_eq!(doc.source_key(), "policies/leave.docx");
    }
}
