//! Multi-collection search: fan-out, merge, truncate.

use std::cmp::Ordering;
use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::debug;

use crate::domain::Domain;
use crate::engine::EngineError;
use crate::store::{CollectionStore, SearchResult};

/// Default number of results returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Options for a search request.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Domains to query; empty means all three
    pub domains: Vec<Domain>,
    /// Maximum number of merged results
    pub limit: usize,
    /// Equality constraints on chunk metadata fields
    pub filter: Option<HashMap<String, String>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            domains: Domain::ALL.to_vec(),
            limit: DEFAULT_SEARCH_LIMIT,
            filter: None,
        }
    }
}

impl SearchOptions {
    /// Restrict the search to the given domains.
    pub fn with_domains(mut self, domains: Vec<Domain>) -> Self {
        self.domains = domains;
        self
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Add a metadata equality constraint.
    pub fn with_filter_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Merge per-domain hit lists into one ranking.
///
/// Sorts ascending by distance and truncates to `limit`. There is no
/// per-domain floor: a domain with many moderate hits can crowd out a
/// domain with a single strong one, because truncation happens only
/// after the global merge.
pub fn merge_hits(per_domain: Vec<Vec<SearchResult>>, limit: usize) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = per_domain.into_iter().flatten().collect();

    merged.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    merged.truncate(limit);

    merged
}

/// Fan a query out to the requested domains and merge the results.
///
/// Each sub-query independently asks for up to `limit` hits; all
/// sub-queries run concurrently and are joined before merging. If any
/// sub-query fails the whole search fails with the offending domain
/// named, so a missing domain's hits are never silently dropped.
pub(crate) async fn fan_out(
    stores: &HashMap<Domain, CollectionStore>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, EngineError> {
    let domains: Vec<Domain> = if options.domains.is_empty() {
        Domain::ALL.to_vec()
    } else {
        options.domains.clone()
    };

    debug!("Searching {:?} for: {}", domains, query);

    let sub_queries = domains.iter().map(|&domain| {
        let filter = options.filter.as_ref();
        async move {
            let store = stores.get(&domain).ok_or(EngineError::BackendUnavailable)?;
            let mut hits = store
                .query(query, options.limit, filter)
                .await
                .map_err(|source| EngineError::DomainQueryFailed { domain, source })?;

            // Tag every hit with its origin collection.
            for hit in &mut hits {
                hit.metadata.domain = domain;
            }
            Ok::<_, EngineError>(hits)
        }
    });

    let per_domain = try_join_all(sub_queries).await?;
    Ok(merge_hits(per_domain, options.limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkMetadata;
    use std::collections::BTreeMap;

    fn hit(id: &str, domain: Domain, distance: f32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata: ChunkMetadata {
                path: format!("{}.rs", id),
                domain,
                chunk_index: 0,
                total_chunks: 1,
                start_line: None,
                end_line: None,
                extension: None,
                section: None,
                extra: BTreeMap::new(),
            },
            distance,
        }
    }

    #[test]
    fn test_merge_sorts_by_distance() {
        let merged = merge_hits(
            vec![
                vec![hit("a", Domain::Code, 0.4), hit("b", Domain::Code, 0.1)],
                vec![hit("c", Domain::Docs, 0.3)],
                vec![hit("d", Domain::Skills, 0.2)],
            ],
            10,
        );

        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c", "a"]);

        for pair in merged.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_merge_truncates_to_limit() {
        let merged = merge_hits(
            vec![
                vec![hit("a", Domain::Code, 0.5), hit("b", Domain::Code, 0.6)],
                vec![hit("c", Domain::Docs, 0.1), hit("d", Domain::Docs, 0.2)],
            ],
            2,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "c");
        assert_eq!(merged[1].id, "d");
    }

    #[test]
    fn test_merge_no_per_domain_floor() {
        // One domain's many moderate hits crowd out another's strong one
        // once the limit bites below the crowd size plus one.
        let merged = merge_hits(
            vec![
                vec![
                    hit("c1", Domain::Code, 0.2),
                    hit("c2", Domain::Code, 0.21),
                    hit("c3", Domain::Code, 0.22),
                ],
                vec![hit("d1", Domain::Docs, 0.25)],
            ],
            3,
        );

        assert!(merged.iter().all(|r| r.metadata.domain == Domain::Code));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_hits(vec![], 10).is_empty());
        assert!(merge_hits(vec![vec![], vec![]], 10).is_empty());
    }

    #[test]
    fn test_merge_zero_limit() {
        let merged = merge_hits(vec![vec![hit("a", Domain::Code, 0.1)]], 0);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_options_default() {
        let options = SearchOptions::default();
        assert_eq!(options.domains, Domain::ALL.to_vec());
        assert_eq!(options.limit, DEFAULT_SEARCH_LIMIT);
        assert!(options.filter.is_none());
    }

    #[test]
    fn test_options_builders() {
        let options = SearchOptions::default()
            .with_domains(vec![Domain::Docs])
            .with_limit(5)
            .with_filter_field("extension", "rs");

        assert_eq!(options.domains, vec![Domain::Docs]);
        assert_eq!(options.limit, 5);
        assert_eq!(
            options.filter.unwrap().get("extension").map(String::as_str),
            Some("rs")
        );
    }
}
