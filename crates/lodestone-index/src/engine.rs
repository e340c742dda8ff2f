//! The retrieval engine facade.
//!
//! A [`RetrievalEngine`] owns the filter, the embedding provider and
//! one [`CollectionStore`] per domain, and exposes the three operations
//! collaborators are allowed to call: `index`, `search`, `stats`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use qdrant_client::Qdrant;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::embeddings::{EmbeddingProvider, HttpEmbeddings};
use crate::filter::FileFilter;
use crate::indexer::{collect_domain_chunks, IndexStats};
use crate::search::{fan_out, SearchOptions};
use crate::store::{CollectionStore, SearchResult};

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The vector backend could not be reached at startup; the engine
    /// runs degraded and every operation reports this instead of
    /// panicking, so a host without retrieval keeps functioning.
    #[error("vector backend unavailable")]
    BackendUnavailable,

    /// One domain's sub-query failed during a multi-domain search.
    #[error("query against the {domain} collection failed")]
    DomainQueryFailed {
        domain: Domain,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The connected half of the engine: one store per domain.
struct Backend {
    stores: HashMap<Domain, CollectionStore>,
}

impl Backend {
    async fn connect(
        config: &EngineConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Self> {
        let mut builder = Qdrant::from_url(&config.qdrant_url).skip_compatibility_check();

        if let Some(ref api_key) = config.qdrant_api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = Arc::new(builder.build().context("Failed to build Qdrant client")?);

        client
            .health_check()
            .await
            .context("Qdrant health check failed")?;

        info!("Connected to Qdrant at {}", config.qdrant_url);

        let stores = Domain::ALL
            .into_iter()
            .map(|domain| {
                let store = CollectionStore::new(
                    Arc::clone(&client),
                    Arc::clone(&embeddings),
                    domain.collection_name(&config.project_name),
                    config.dimensions,
                );
                (domain, store)
            })
            .collect();

        Ok(Self { stores })
    }

    fn store(&self, domain: Domain) -> &CollectionStore {
        // Populated for every domain at construction.
        &self.stores[&domain]
    }
}

/// Project indexing and semantic retrieval engine.
pub struct RetrievalEngine {
    config: EngineConfig,
    filter: FileFilter,
    backend: Option<Backend>,
    last_indexed: RwLock<Option<DateTime<Utc>>>,
}

impl RetrievalEngine {
    /// Connect to the configured backend.
    ///
    /// An unreachable backend is not an error: the engine comes up
    /// degraded and every operation returns
    /// [`EngineError::BackendUnavailable`] until a new engine is built.
    pub async fn connect(config: EngineConfig) -> Result<Self, EngineError> {
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddings::new(
            config.embedding_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.dimensions,
        ));
        Self::with_embeddings(config, embeddings).await
    }

    /// Connect with a caller-supplied embedding provider.
    pub async fn with_embeddings(
        config: EngineConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, EngineError> {
        let filter = FileFilter::new(&config)?;

        let backend = match Backend::connect(&config, embeddings).await {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!("Vector backend unavailable, retrieval disabled: {:#}", e);
                None
            }
        };

        Ok(Self {
            config,
            filter,
            backend,
            last_indexed: RwLock::new(None),
        })
    }

    /// Build an engine with no backend at all. Every operation reports
    /// [`EngineError::BackendUnavailable`].
    pub fn detached(config: EngineConfig) -> Result<Self, EngineError> {
        let filter = FileFilter::new(&config)?;
        Ok(Self {
            config,
            filter,
            backend: None,
            last_indexed: RwLock::new(None),
        })
    }

    /// Whether the vector backend was reachable at construction.
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Full rebuild of all three collections.
    ///
    /// Each domain's collection is wholly replaced by the chunks
    /// produced from the current file tree; a domain that yields zero
    /// chunks is left out of the stats. Unreadable files are skipped and
    /// recorded in `failed_files`. Idempotent for an unchanged tree,
    /// since chunk ids and contents are deterministic. If a rebuild
    /// fails partway the collection is incomplete; rerun `index` rather
    /// than trusting the previous stats.
    pub async fn index(&self) -> Result<IndexStats, EngineError> {
        let backend = self.backend()?;
        info!("Indexing project at {:?}", self.config.project_root);

        let mut stats = IndexStats::default();

        for domain in Domain::ALL {
            let batch = collect_domain_chunks(&self.config, &self.filter, domain)?;
            stats.failed_files.extend(batch.failed);

            // An empty batch still rebuilds, so chunks of files removed
            // since the last run don't linger in the collection.
            backend.store(domain).replace_all(&batch.chunks).await?;

            if batch.chunks.is_empty() {
                debug!("No chunks for {} domain", domain);
                continue;
            }

            stats.collections.push(domain.to_string());
            stats.total_documents += batch.chunks.len();
        }

        let now = Utc::now();
        *self.last_indexed.write().await = Some(now);
        stats.last_indexed = Some(now);

        info!(
            "Indexed {} chunks across {:?} ({} files skipped)",
            stats.total_documents,
            stats.collections,
            stats.failed_files.len()
        );
        Ok(stats)
    }

    /// Similarity search across the requested domains.
    ///
    /// Read-only. Results are merged across domains, sorted ascending
    /// by distance and truncated to `options.limit`; there is no
    /// per-domain reservation, so one domain can fill the whole list.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>, EngineError> {
        let backend = self.backend()?;
        fan_out(&backend.stores, query, &options).await
    }

    /// Current index summary, recomputed from live collection counts.
    pub async fn stats(&self) -> Result<IndexStats, EngineError> {
        let backend = self.backend()?;

        let mut stats = IndexStats {
            last_indexed: *self.last_indexed.read().await,
            ..Default::default()
        };

        for domain in Domain::ALL {
            let count = backend
                .store(domain)
                .count()
                .await
                .map_err(EngineError::Other)?;
            if count > 0 {
                stats.collections.push(domain.to_string());
                stats.total_documents += count;
            }
        }

        Ok(stats)
    }

    fn backend(&self) -> Result<&Backend, EngineError> {
        self.backend.as_ref().ok_or(EngineError::BackendUnavailable)
    }
}
