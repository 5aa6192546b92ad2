use anyhow::{anyhow, Context, Result};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetPointsBuilder, PointId,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use rag_core::{Chunk, ChunkMetadata, Embedding, RetrievedChunk};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

use super::local_store::LocalVectorStore;

/// Vector store backends
pub enum VectorStore {
    /// JSON collection file inside a persistence directory
    Local(LocalVectorStore),
    /// Remote Qdrant collection
    Qdrant(QdrantVectorStore),
}

impl VectorStore {
    /// Open (lazily) a local collection under `persist_dir`
    pub fn local(persist_dir: impl Into<PathBuf>, collection_name: &str) -> Result<Self> {
        Ok(Self::Local(LocalVectorStore::new(
            persist_dir,
            collection_name,
        )?))
    }

    /// Connect to Qdrant and make sure the collection exists
    pub async fn qdrant(qdrant_url: &str, collection_name: &str, dimension: usize) -> Result<Self> {
        let store = QdrantVectorStore::new(qdrant_url, collection_name.to_string())?;
        store
            .create_collection_if_not_exists(dimension as u64)
            .await?;
        Ok(Self::Qdrant(store))
    }

    /// Persist chunks with their vectors; returns how many were written.
    ///
    /// The local store skips ids it already holds. Qdrant upserts every point,
    /// so callers filter with [`VectorStore::existing_ids`] first to count
    /// skips on either backend.
    pub async fn add(&self, chunks: &[Chunk], vectors: Vec<Embedding>) -> Result<usize> {
        match self {
            VectorStore::Local(store) => store.add(chunks, vectors).await,
            VectorStore::Qdrant(store) => {
                if chunks.len() != vectors.len() {
                    return Err(anyhow!(
                        "{} chunks but {} vectors",
                        chunks.len(),
                        vectors.len()
                    ));
                }
                let points: Vec<PointStruct> = chunks
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| chunk_to_point(chunk, vector))
                    .collect();
                let written = points.len();
                store.upsert_points(points).await?;
                Ok(written)
            }
        }
    }

    /// The `k` nearest chunks, closest first
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        match self {
            VectorStore::Local(store) => store.query(vector, k).await,
            VectorStore::Qdrant(store) => store
                .search(vector.to_vec(), k as u64, None)
                .await?
                .into_iter()
                .map(scored_point_to_chunk)
                .collect(),
        }
    }

    /// Which of `ids` are already stored
    pub async fn existing_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        match self {
            VectorStore::Local(store) => store.existing_ids(ids).await,
            VectorStore::Qdrant(store) => store.existing_ids(ids).await,
        }
    }

    /// Reject a collection written by a different embedding model.
    /// Qdrant collections carry no model record, so only the local store checks.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        match self {
            VectorStore::Local(store) => store.ensure_model(model).await,
            VectorStore::Qdrant(_) => Ok(()),
        }
    }

    pub async fn count(&self) -> Result<usize> {
        match self {
            VectorStore::Local(store) => store.count().await,
            VectorStore::Qdrant(store) => store.count().await,
        }
    }

    /// Human-readable location, for logs
    pub fn describe(&self) -> String {
        match self {
            VectorStore::Local(store) => format!("local:{}", store.path().display()),
            VectorStore::Qdrant(store) => {
                format!("qdrant:{}/{}", store.url, store.collection_name)
            }
        }
    }
}

/// Qdrant vector store for document chunks
pub struct QdrantVectorStore {
    client: Qdrant,
    url: String,
    collection_name: String,
}

impl QdrantVectorStore {
    pub fn new(qdrant_url: &str, collection_name: String) -> Result<Self> {
        let client = Qdrant::from_url(qdrant_url)
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", qdrant_url))?;

        tracing::info!("Connecting to Qdrant at {}", qdrant_url);

        Ok(Self {
            client,
            url: qdrant_url.to_string(),
            collection_name,
        })
    }

    /// Create collection if it doesn't exist
    pub async fn create_collection_if_not_exists(&self, dimension: u64) -> Result<()> {
        if self.client.collection_exists(&self.collection_name).await? {
            tracing::info!("Qdrant collection {} already exists", self.collection_name);
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
            )
            .await?;

        tracing::info!("Created Qdrant collection: {}", self.collection_name);
        Ok(())
    }

    /// Upload points to Qdrant. Ids are deterministic, so re-uploading a chunk
    /// overwrites it instead of duplicating it.
    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        tracing::info!("Upserting {} points to Qdrant", points.len());

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await?;

        Ok(())
    }

    /// Search for similar vectors
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection_name, query_vector, limit)
                .with_payload(true);

        if let Some(threshold) = score_threshold {
            search_builder = search_builder.score_threshold(threshold);
        }

        let search_result = self.client.search_points(search_builder).await?;

        Ok(search_result.result)
    }

    /// Look up point ids without fetching payloads or vectors
    pub async fn existing_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| id.to_string().into()).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection_name, point_ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| match point.id?.point_id_options? {
                PointIdOptions::Uuid(id) => Uuid::parse_str(&id).ok(),
                PointIdOptions::Num(_) => None,
            })
            .collect())
    }

    pub async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

/// Build a Qdrant point carrying the chunk text and provenance as payload
pub fn chunk_to_point(chunk: &Chunk, embedding: Embedding) -> PointStruct {
    let mut payload = serde_json::Map::new();
    payload.insert("text".to_string(), chunk.text.clone().into());
    payload.insert("source".to_string(), chunk.metadata.source.clone().into());
    payload.insert(
        "chunk_index".to_string(),
        (chunk.metadata.chunk_index as u64).into(),
    );
    payload.insert(
        "start_index".to_string(),
        (chunk.metadata.start_index as u64).into(),
    );

    PointStruct::new(chunk.id().to_string(), embedding, payload)
}

/// Rebuild a retrieved chunk from a search hit
pub fn scored_point_to_chunk(point: ScoredPoint) -> Result<RetrievedChunk> {
    let payload = point.payload;

    let chunk = Chunk::new(
        get_payload_string(&payload, "text")?,
        ChunkMetadata {
            source: get_payload_string(&payload, "source")?,
            chunk_index: get_payload_u64(&payload, "chunk_index")? as usize,
            start_index: get_payload_u64(&payload, "start_index")? as usize,
        },
    );

    Ok(RetrievedChunk {
        chunk,
        score: point.score,
    })
}

fn get_payload_string(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Result<String> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            qdrant_client::qdrant::value::Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}

fn get_payload_u64(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> Result<u64> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            qdrant_client::qdrant::value::Kind::IntegerValue(i) => Some(*i as u64),
            qdrant_client::qdrant::value::Kind::DoubleValue(d) => Some(*d as u64),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        Chunk::new(
            "Employees accrue 1.5 days of leave per month.",
            ChunkMetadata {
                source: "policies/leave.docx".to_string(),
                chunk_index: 2,
                start_index: 2300,
            },
        )
    }

    #[test]
    fn test_chunk_to_point() {
        let point = chunk_to_point(&sample_chunk(), vec![0.1; 384]);

        assert!(point.id.is_some());
        assert!(point.vectors.is_some());
        assert!(point.payload.contains_key("text"));
        assert!(point.payload.contains_key("source"));
        assert!(point.payload.contains_key("start_index"));
    }

    #[test]
    fn test_scored_point_restores_chunk() {
        let chunk = sample_chunk();
        let point = chunk_to_point(&chunk, vec![0.1; 384]);
        let scored = ScoredPoint {
            payload: point.payload,
            score: 0.83,
            ..Default::default()
        };

        let retrieved = scored_point_to_chunk(scored).unwrap();
        assert_eq!(retrieved.chunk, chunk);
        assert_eq!(retrieved.score, 0.83);
    }

    #[test]
    fn test_scored_point_missing_text_fails() {
        let scored = ScoredPoint {
            score: 0.5,
            ..Default::default()
        };
        assert!(scored_point_to_chunk(scored).is_err());
    }

    #[tokio::test]
    async fn test_local_backend_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::local(dir.path(), "collections").unwrap();

        assert!(store.describe().starts_with("local:"));
        assert!(store.query(&[1.0, 0.0], 4).await.unwrap().is_empty());

        let written = store
            .add(&[sample_chunk()], vec![vec![1.0, 0.0]])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_local_backend_filters_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::local(dir.path(), "collections").unwrap();
        store.ensure_model("feature-hashing").await.unwrap();
        store
            .add(&[sample_chunk()], vec![vec![1.0, 0.0]])
            .await
            .unwrap();

        let known = sample_chunk().id();
        let unknown = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"unknown");
        let existing = store.existing_ids(&[known, unknown]).await.unwrap();

        assert_eq!(existing.len(), 1);
        assert!(existing.contains(&known));
        assert!(store.ensure_model("other-model").await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Qdrant running
    async fn test_qdrant_round_trip() {
        let store = VectorStore::qdrant("http://localhost:6334", "test_document_chunks", 2)
            .await
            .unwrap();

        store
            .add(&[sample_chunk()], vec![vec![1.0, 0.0]])
            .await
            .unwrap();
        let results = store.query(&[1.0, 0.0], 4).await.unwrap();

        assert_eq!(results[0].chunk, sample_chunk());

        let id = sample_chunk().id();
        assert!(store.existing_ids(&[id]).await.unwrap().contains(&id));
    }
}
