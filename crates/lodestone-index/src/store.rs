//! Qdrant collection adapter.
//!
//! One [`CollectionStore`] wraps one named collection and supports the
//! full lifecycle the engine needs: rebuild from a chunk set, similarity
//! query, and point count. The Qdrant handle is shared and passed in
//! explicitly, never looked up globally.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    QuantizationType, ScalarQuantizationBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::{point_id, Chunk, ChunkMetadata};
use crate::domain::Domain;
use crate::embeddings::EmbeddingProvider;

/// Number of chunks upserted per batch, to respect payload limits.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// A similarity hit converted to the engine's result shape.
///
/// `distance` is a dissimilarity score: lower means more similar. It is
/// derived from Qdrant's cosine similarity as `1.0 - score` and never
/// re-scored beyond that. It is not a confidence percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Logical chunk id (`"{domain}:{path}:{chunk_index}"`)
    pub id: String,

    /// The chunk text
    pub content: String,

    /// Chunk metadata, including the origin domain
    pub metadata: ChunkMetadata,

    /// Dissimilarity score, lower is more similar
    pub distance: f32,
}

/// Adapter around one Qdrant collection.
pub struct CollectionStore {
    client: Arc<Qdrant>,
    embeddings: Arc<dyn EmbeddingProvider>,
    collection_name: String,
    dimensions: usize,
}

impl CollectionStore {
    /// Create a store for a named collection on a shared client.
    pub fn new(
        client: Arc<Qdrant>,
        embeddings: Arc<dyn EmbeddingProvider>,
        collection_name: String,
        dimensions: usize,
    ) -> Self {
        Self {
            client,
            embeddings,
            collection_name,
            dimensions,
        }
    }

    /// Whether the collection exists on the server.
    pub async fn exists(&self) -> Result<bool> {
        let collections = self.client.list_collections().await?;
        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name))
    }

    /// Create the collection if it doesn't exist (with scalar
    /// quantization for 4x compression).
    pub async fn ensure_collection(&self) -> Result<()> {
        if !self.exists().await? {
            info!(
                "Creating collection: {} with {} dimensions",
                self.collection_name, self.dimensions
            );

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorParamsBuilder::new(
                            self.dimensions as u64,
                            Distance::Cosine,
                        ))
                        .quantization_config(
                            ScalarQuantizationBuilder::default()
                                .r#type(QuantizationType::Int8.into())
                                .quantile(0.99)
                                .always_ram(true),
                        ),
                )
                .await
                .context("Failed to create collection")?;
        } else {
            debug!("Collection {} already exists", self.collection_name);
        }

        Ok(())
    }

    /// Rebuild the collection from a chunk set.
    ///
    /// Deletes every existing point, then inserts the new chunks in
    /// batches of [`UPSERT_BATCH_SIZE`], each batch awaited before the
    /// next is sent. A failure partway leaves the collection incomplete;
    /// the recovery is to rerun the index pass, which is idempotent
    /// because point ids are deterministic.
    pub async fn replace_all(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            // An empty rebuild still clears residue from a previous run,
            // but doesn't create a collection that never existed.
            if self.exists().await? {
                self.client
                    .delete_points(
                        DeletePointsBuilder::new(&self.collection_name)
                            .points(Filter::default())
                            .wait(true),
                    )
                    .await
                    .context("Failed to clear collection")?;
            }
            return Ok(());
        }

        self.ensure_collection().await?;

        debug!(
            "Rebuilding collection {} with {} chunks",
            self.collection_name,
            chunks.len()
        );

        // Delete-all must complete before the first insert batch.
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(Filter::default())
                    .wait(true),
            )
            .await
            .context("Failed to clear collection")?;

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let vectors = self.embed_chunks(batch).await?;

            let points: Vec<PointStruct> = batch
                .iter()
                .zip(vectors.into_iter())
                .map(|(chunk, vector)| {
                    let payload = chunk_to_payload(chunk);
                    PointStruct::new(point_id(&chunk.id), vector, payload)
                })
                .collect();

            self.client
                .upsert_points(
                    UpsertPointsBuilder::new(&self.collection_name, points).wait(true),
                )
                .await
                .context("Failed to upsert batch")?;

            debug!(
                "Upserted batch of {} points into {}",
                batch.len(),
                self.collection_name
            );
        }

        Ok(())
    }

    /// Similarity search, optionally constrained by metadata equality.
    pub async fn query(
        &self,
        query_text: &str,
        limit: usize,
        filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self.embeddings.embed(query_text).await?;

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection_name, query_vector, limit as u64)
                .with_payload(true);

        if let Some(fields) = filter {
            let conditions: Vec<Condition> = fields
                .iter()
                .map(|(key, value)| Condition::matches(key.clone(), value.clone()))
                .collect();
            if !conditions.is_empty() {
                search_builder = search_builder.filter(Filter::must(conditions));
            }
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .context("Failed to search points")?;

        let hits: Vec<SearchResult> = results
            .result
            .into_iter()
            .map(|p| {
                let (id, content, metadata) = payload_to_chunk_parts(&p.payload);
                SearchResult {
                    id,
                    content,
                    metadata,
                    // Cosine score is a similarity, callers get a distance.
                    distance: 1.0 - p.score,
                }
            })
            .collect();

        debug!(
            "Found {} hits in {}",
            hits.len(),
            self.collection_name
        );
        Ok(hits)
    }

    /// Count points in the collection. Zero if it doesn't exist yet.
    pub async fn count(&self) -> Result<usize> {
        if !self.exists().await? {
            return Ok(0);
        }

        let info = self
            .client
            .collection_info(&self.collection_name)
            .await
            .context("Failed to get collection info")?;

        let count = info
            .result
            .map(|r| r.points_count.unwrap_or(0) as usize)
            .unwrap_or(0);

        Ok(count)
    }

    /// Get collection name.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Embed a batch of chunks, respecting the provider's batch limit.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for sub_batch in texts.chunks(self.embeddings.max_batch_size()) {
            vectors.extend(self.embeddings.embed_batch(sub_batch).await?);
        }

        Ok(vectors)
    }
}

/// Payload field names reserved for the engine's own metadata.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "content",
    "path",
    "domain",
    "chunk_index",
    "total_chunks",
    "start_line",
    "end_line",
    "extension",
    "section",
];

/// Convert a chunk to Qdrant's payload map.
fn chunk_to_payload(chunk: &Chunk) -> HashMap<String, qdrant_client::qdrant::Value> {
    let mut map = HashMap::new();
    let meta = &chunk.metadata;

    // Front-matter extras go in first so reserved keys always win.
    for (key, value) in &meta.extra {
        map.insert(
            key.clone(),
            qdrant_client::qdrant::Value::from(value.clone()),
        );
    }

    map.insert(
        "id".to_string(),
        qdrant_client::qdrant::Value::from(chunk.id.clone()),
    );
    map.insert(
        "content".to_string(),
        qdrant_client::qdrant::Value::from(chunk.content.clone()),
    );
    map.insert(
        "path".to_string(),
        qdrant_client::qdrant::Value::from(meta.path.clone()),
    );
    map.insert(
        "domain".to_string(),
        qdrant_client::qdrant::Value::from(meta.domain.as_str().to_string()),
    );
    map.insert(
        "chunk_index".to_string(),
        qdrant_client::qdrant::Value::from(meta.chunk_index as i64),
    );
    map.insert(
        "total_chunks".to_string(),
        qdrant_client::qdrant::Value::from(meta.total_chunks as i64),
    );

    if let Some(start_line) = meta.start_line {
        map.insert(
            "start_line".to_string(),
            qdrant_client::qdrant::Value::from(start_line as i64),
        );
    }
    if let Some(end_line) = meta.end_line {
        map.insert(
            "end_line".to_string(),
            qdrant_client::qdrant::Value::from(end_line as i64),
        );
    }
    if let Some(ref extension) = meta.extension {
        map.insert(
            "extension".to_string(),
            qdrant_client::qdrant::Value::from(extension.clone()),
        );
    }
    if let Some(ref section) = meta.section {
        map.insert(
            "section".to_string(),
            qdrant_client::qdrant::Value::from(section.clone()),
        );
    }

    map
}

/// Convert a Qdrant payload map back to `(id, content, metadata)`.
fn payload_to_chunk_parts(
    map: &HashMap<String, qdrant_client::qdrant::Value>,
) -> (String, String, ChunkMetadata) {
    let domain = extract_string(map.get("domain"))
        .parse::<Domain>()
        .unwrap_or(Domain::Code);

    let mut extra = BTreeMap::new();
    for (key, value) in map {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(s) = extract_string_opt(value) {
            extra.insert(key.clone(), s);
        }
    }

    let metadata = ChunkMetadata {
        path: extract_string(map.get("path")),
        domain,
        chunk_index: extract_integer(map.get("chunk_index")) as usize,
        total_chunks: extract_integer(map.get("total_chunks")) as usize,
        start_line: map.get("start_line").and_then(extract_integer_opt).map(|i| i as usize),
        end_line: map.get("end_line").and_then(extract_integer_opt).map(|i| i as usize),
        extension: map.get("extension").and_then(extract_string_opt),
        section: map.get("section").and_then(extract_string_opt),
        extra,
    };

    (
        extract_string(map.get("id")),
        extract_string(map.get("content")),
        metadata,
    )
}

fn extract_string(value: Option<&qdrant_client::qdrant::Value>) -> String {
    value.and_then(extract_string_opt).unwrap_or_default()
}

fn extract_string_opt(value: &qdrant_client::qdrant::Value) -> Option<String> {
    if let Some(qdrant_client::qdrant::value::Kind::StringValue(s)) = &value.kind {
        Some(s.clone())
    } else {
        None
    }
}

fn extract_integer(value: Option<&qdrant_client::qdrant::Value>) -> i64 {
    value.and_then(extract_integer_opt).unwrap_or(0)
}

fn extract_integer_opt(value: &qdrant_client::qdrant::Value) -> Option<i64> {
    if let Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)) = &value.kind {
        Some(*i)
    } else {
        None
    }
}
