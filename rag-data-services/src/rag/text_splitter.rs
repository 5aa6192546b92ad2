use anyhow::Result;
use rag_core::{Chunk, ChunkMetadata, Document, RagError};
use std::collections::VecDeque;

/// Splitter configuration. Sizes are measured in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Separators tried in order, coarsest first. An empty string means
    /// "split between any two characters".
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 350,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Recursive character splitter.
///
/// Splits on the first separator present in the text, recurses into pieces
/// that are still too long with the next separator, then greedily merges
/// neighbouring pieces up to `chunk_size`, keeping up to `chunk_overlap`
/// characters of the previous chunk as leading context.
pub struct RecursiveTextSplitter {
    config: SplitterConfig,
}

impl RecursiveTextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunk_size must be > 0".to_string()).into());
        }
        if config.chunk_overlap > config.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) is larger than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            ))
            .into());
        }

        Ok(Self { config })
    }

    /// Split every document, preserving document order
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect()
    }

    /// Split one document and attach source, index and character offset
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let source = document.source_key();
        let text = document.text.as_str();

        let mut index = 0usize;
        let mut previous_len = 0usize;
        let mut chunks = Vec::new();

        for (chunk_index, piece) in self.split_text(text).into_iter().enumerate() {
            let search_from = (index + previous_len).saturating_sub(self.config.chunk_overlap);
            match find_from(text, &piece, search_from) {
                Some(found) => index = found,
                None => tracing::warn!(
                    "Could not locate chunk {} of {} in its source text",
                    chunk_index,
                    source
                ),
            }
            previous_len = char_len(&piece);

            chunks.push(Chunk::new(
                piece,
                ChunkMetadata {
                    source: source.clone(),
                    chunk_index,
                    start_index: index,
                },
            ));
        }

        tracing::debug!("Split {} into {} chunks", source, chunks.len());
        chunks
    }

    /// Split raw text into chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if finer.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily pack pieces into chunks, carrying the overlap window forward
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);

            if total + len > chunk_size {
                if total > chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }

                    while total > overlap || (total + len > chunk_size && total > 0) {
                        match current.pop_front() {
                            Some((_, first_len)) => total -= first_len,
                            None => break,
                        }
                    }
                }
            }

            current.push_back((split.as_str(), len));
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, keeping it attached to the start of the following
/// piece. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();

    if let Some(first) = parts.next() {
        pieces.push(first.to_string());
    }
    pieces.extend(parts.map(|part| format!("{}{}", separator, part)));

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_pieces(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Character index of `needle` in `haystack`, searching from character `from`
fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start_byte = haystack
        .char_indices()
        .nth(from)
        .map(|(byte, _)| byte)
        .unwrap_or(haystack.len());

    haystack[start_byte..]
        .find(needle)
        .map(|pos| from + char_len(&haystack[start_byte..start_byte + pos]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter() -> RecursiveTextSplitter {
        RecursiveTextSplitter::new(SplitterConfig::default()).unwrap()
    }

    fn alphabet_text(len: usize) -> String {
        (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect()
    }

    #[test]
    fn test_default_config() {
        let config = SplitterConfig::default();
        assert_eq!(config.chunk_size, 1500);
        assert_eq!(config.chunk_overlap, 350);
        assert_eq!(config.separators, vec!["\n\n", "\n", " ", ""]);
    }

    #[test]
    fn test_3200_chars_without_separators_gives_three_chunks() {
        let text = alphabet_text(3200);
        let doc = Document::new(text.clone(), "plain.txt");

        let chunks = splitter().split_document(&doc);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, text[0..1500]);
        assert_eq!(chunks[1].text, text[1150..2650]);
        assert_eq!(chunks[2].text, text[2300..3200]);

        let starts: Vec<usize> = chunks.iter().map(|c| c.metadata.start_index).collect();
        assert_eq!(starts, vec![0, 1150, 2300]);

        // chunk 2 begins inside chunk 1's span and shares 350 characters with it
        assert!(chunks[0].text.ends_with(&chunks[1].text[..350]));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = format!("{}.", "alpha beta gamma ".repeat(55).trim_end());
        let second = format!("{}.", "delta epsilon zeta ".repeat(50).trim_end());
        let text = format!("{}\n\n{}", first, second);

        let chunks = splitter().split_text(&text);

        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_word_fallback_respects_size_and_overlap() {
        let text: String = (0..600)
            .map(|i| format!("word{:03}", i))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = splitter().split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1500);
            assert!(!chunk.starts_with(' '));
        }
        for pair in chunks.windows(2) {
            let head = &pair[1][..20];
            assert!(pair[0].contains(head), "consecutive chunks should overlap");
        }
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = splitter().split_text("  A short note.  ");
        assert_eq!(chunks, vec!["A short note."]);
    }

    #[test]
    fn test_empty_and_whitespace_text_produce_nothing() {
        assert!(splitter().split_text("").is_empty());
        assert!(splitter().split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn test_splitting_is_deterministic() {
        let docs = vec![
            Document::new(alphabet_text(4000), "a.txt"),
            Document::new("one\n\ntwo three".to_string(), "b.txt"),
        ];

        let first = splitter().split_documents(&docs);
        let second = splitter().split_documents(&docs);

        assert_eq!(first, second);
        assert_eq!(first.last().unwrap().metadata.source, "b.txt");
        assert_eq!(first.last().unwrap().metadata.chunk_index, 0);
    }

    #[test]
    fn test_multibyte_text_is_measured_in_characters() {
        let config = SplitterConfig {
            chunk_size: 4,
            chunk_overlap: 1,
            ..Default::default()
        };
        let splitter = RecursiveTextSplitter::new(config).unwrap();
        let doc = Document::new("äöüßéè", "umlaut.txt");

        let chunks = splitter.split_document(&doc);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["äöüß", "ßéè"]);
        assert_eq!(chunks[1].metadata.start_index, 3);
    }

    #[test]
    fn test_overlap_larger_than_size_rejected() {
        let config = SplitterConfig {
            chunk_size: 100,
            chunk_overlap: 200,
            ..Default::default()
        };
        let err = RecursiveTextSplitter::new(config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("\n\nb", "\n\n"), vec!["\n\nb"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_find_from_uses_character_offsets() {
        assert_eq!(find_from("ääab", "ab", 0), Some(2));
        assert_eq!(find_from("abab", "ab", 1), Some(2));
        assert_eq!(find_from("abc", "zz", 0), None);
    }
}
