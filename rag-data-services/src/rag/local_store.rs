use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rag_core::{Chunk, Embedding, RagError, RetrievedChunk};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: Uuid,
    chunk: Chunk,
    vector: Embedding,
}

/// On-disk layout of one collection
#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    /// Fixed by the first vector ever added
    dimension: Option<usize>,
    /// Embedding model that produced the vectors
    #[serde(default)]
    model: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    entries: Vec<StoredEntry>,
}

struct Collection {
    file: CollectionFile,
    ids: HashSet<Uuid>,
}

impl Collection {
    fn empty(name: &str) -> Self {
        Self {
            file: CollectionFile {
                name: name.to_string(),
                ..Default::default()
            },
            ids: HashSet::new(),
        }
    }

    fn from_file(file: CollectionFile) -> Self {
        let ids = file.entries.iter().map(|e| e.id).collect();
        Self { file, ids }
    }
}

/// File-backed vector store: one JSON document per collection inside a
/// persistence directory, searched by brute-force cosine similarity.
///
/// Nothing touches the disk until the first operation; the collection is then
/// loaded once and kept in memory. Writes go to a temp file that is renamed
/// over the previous version.
pub struct LocalVectorStore {
    dir: PathBuf,
    collection_name: String,
    state: Mutex<Option<Collection>>,
}

impl LocalVectorStore {
    pub fn new(dir: impl Into<PathBuf>, collection_name: impl Into<String>) -> Result<Self> {
        let collection_name = collection_name.into();
        validate_collection_name(&collection_name)?;

        Ok(Self {
            dir: dir.into(),
            collection_name,
            state: Mutex::new(None),
        })
    }

    /// Path of the collection file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.collection_name))
    }

    /// Add chunks with their vectors, skipping ids already stored.
    ///
    /// The batch is validated as a whole and only becomes visible once it has
    /// been written to disk; a rejected batch leaves the collection unchanged.
    /// Returns the number of entries actually inserted.
    pub async fn add(&self, chunks: &[Chunk], vectors: Vec<Embedding>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(RagError::VectorStore(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            ))
            .into());
        }

        let mut guard = self.collection().await?;
        let collection = guard
            .as_mut()
            .ok_or_else(|| anyhow!("collection not loaded"))?;

        let mut dimension = collection.file.dimension;
        for vector in &vectors {
            match dimension {
                Some(expected) if expected != vector.len() => {
                    return Err(RagError::VectorStore(format!(
                        "vector dimension {} does not match collection dimension {}",
                        vector.len(),
                        expected
                    ))
                    .into());
                }
                Some(_) => {}
                None => dimension = Some(vector.len()),
            }
        }

        let mut batch_ids = HashSet::new();
        let new_entries: Vec<StoredEntry> = chunks
            .iter()
            .zip(vectors)
            .filter_map(|(chunk, vector)| {
                let id = chunk.id();
                (!collection.ids.contains(&id) && batch_ids.insert(id)).then(|| StoredEntry {
                    id,
                    chunk: chunk.clone(),
                    vector,
                })
            })
            .collect();

        let inserted = new_entries.len();
        if inserted > 0 {
            let previous_len = collection.file.entries.len();
            let previous_dimension = collection.file.dimension;
            let previous_updated_at = collection.file.updated_at;

            collection.file.entries.extend(new_entries);
            collection.file.dimension = dimension;
            collection.file.updated_at = Some(Utc::now());

            if let Err(e) = self.persist(&collection.file).await {
                collection.file.entries.truncate(previous_len);
                collection.file.dimension = previous_dimension;
                collection.file.updated_at = previous_updated_at;
                return Err(e);
            }

            collection.ids.extend(batch_ids);
        }

        tracing::debug!(
            "Added {} of {} entries to collection {}",
            inserted,
            chunks.len(),
            self.collection_name
        );

        Ok(inserted)
    }

    /// Which of `ids` are already stored
    pub async fn existing_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let guard = self.collection().await?;

        Ok(guard
            .as_ref()
            .map(|collection| {
                ids.iter()
                    .filter(|id| collection.ids.contains(*id))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Bind the collection to an embedding model.
    ///
    /// A collection remembers the model that first wrote to it. Vectors from
    /// different models are not comparable, so any other model is rejected.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        let mut guard = self.collection().await?;
        let collection = guard
            .as_mut()
            .ok_or_else(|| anyhow!("collection not loaded"))?;

        match &collection.file.model {
            Some(stored) if stored != model => Err(RagError::VectorStore(format!(
                "collection {} was built with embedding model '{}' but '{}' is configured; \
                 use another collection or remove {}",
                self.collection_name,
                stored,
                model,
                self.path().display()
            ))
            .into()),
            Some(_) => Ok(()),
            None => {
                collection.file.model = Some(model.to_string());
                Ok(())
            }
        }
    }

    /// The `k` stored chunks closest to `vector`, highest similarity first.
    /// Ties keep insertion order.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let guard = self.collection().await?;
        let Some(collection) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        if k == 0 || collection.file.entries.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(dimension) = collection.file.dimension {
            if dimension != vector.len() {
                return Err(RagError::VectorStore(format!(
                    "query dimension {} does not match collection dimension {}",
                    vector.len(),
                    dimension
                ))
                .into());
            }
        }

        let mut scored: Vec<(f32, &StoredEntry)> = collection
            .file
            .entries
            .iter()
            .map(|entry| (cosine_similarity(vector, &entry.vector), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Number of stored entries
    pub async fn count(&self) -> Result<usize> {
        let guard = self.collection().await?;
        Ok(guard.as_ref().map(|c| c.file.entries.len()).unwrap_or(0))
    }

    /// Lock the collection, loading it from disk on first access
    async fn collection(&self) -> Result<MutexGuard<'_, Option<Collection>>> {
        let mut guard = self.state.lock().await;

        if guard.is_none() {
            let collection = load_collection(&self.path(), &self.collection_name)?;
            tracing::info!(
                "Opened collection {} at {} ({} entries)",
                self.collection_name,
                self.path().display(),
                collection.file.entries.len()
            );
            *guard = Some(collection);
        }

        Ok(guard)
    }

    async fn persist(&self, file: &CollectionFile) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(file)?;

        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }
}

fn load_collection(path: &Path, name: &str) -> Result<Collection> {
    if !path.exists() {
        return Ok(Collection::empty(name));
    }

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file: CollectionFile = serde_json::from_slice(&bytes).map_err(|e| {
        RagError::VectorStore(format!("corrupt collection file {}: {}", path.display(), e))
    })?;

    Ok(Collection::from_file(file))
}

fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(RagError::InvalidConfig(format!("invalid collection name '{}'", name)).into())
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
