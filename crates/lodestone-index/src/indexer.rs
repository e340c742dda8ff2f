//! Index orchestration: walk, filter, chunk, per domain.
//!
//! File enumeration and chunking are separated from the datastore so
//! the pipeline can be exercised without a running backend; the engine
//! facade feeds each domain's batch into its collection store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::chunker::{chunk_code, chunk_markdown, Chunk};
use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::filter::FileFilter;

/// Summary of the indexed corpus.
///
/// `total_documents` counts chunks in the datastore sense (each chunk
/// is one embedded document). Recomputed on demand; the collection
/// counts are authoritative, this is never a source of truth.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexStats {
    /// Total chunks across all collections
    pub total_documents: usize,
    /// Domains that currently hold at least one chunk
    pub collections: Vec<String>,
    /// When the last successful index run finished
    pub last_indexed: Option<DateTime<Utc>>,
    /// Files that failed to read or chunk and were skipped
    pub failed_files: Vec<String>,
}

/// All chunks produced for one domain in one index pass.
#[derive(Debug, Default)]
pub struct DomainBatch {
    /// Chunks for the domain's collection, in file order
    pub chunks: Vec<Chunk>,
    /// Number of files that contributed at least one chunk
    pub documents: usize,
    /// Project-relative paths that failed and were skipped
    pub failed: Vec<String>,
}

/// Enumerate, filter, read and chunk every eligible file for a domain.
///
/// A file that fails to read or chunk is skipped and recorded in
/// `failed`; one malformed file never aborts the pass.
pub fn collect_domain_chunks(
    config: &EngineConfig,
    filter: &FileFilter,
    domain: Domain,
) -> Result<DomainBatch> {
    let mut batch = DomainBatch::default();

    for rel_path in domain_files(config, filter, domain)? {
        let abs_path = config.project_root.join(&rel_path);
        let rel_str = rel_path.to_string_lossy().to_string();

        let content = match fs::read_to_string(&abs_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", rel_str, e);
                batch.failed.push(rel_str);
                continue;
            }
        };

        let chunks = match domain {
            Domain::Code => {
                let extension = rel_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                chunk_code(&rel_str, &content, extension)
            }
            Domain::Docs | Domain::Skills => chunk_markdown(domain, &rel_str, &content),
        };

        if chunks.is_empty() {
            debug!("No chunks from {}", rel_str);
            continue;
        }

        batch.documents += 1;
        batch.chunks.extend(chunks);
    }

    debug!(
        "Collected {} chunks from {} {} files ({} failed)",
        batch.chunks.len(),
        batch.documents,
        domain,
        batch.failed.len()
    );

    Ok(batch)
}

/// Candidate files for a domain, as project-relative paths in
/// deterministic order.
fn domain_files(
    config: &EngineConfig,
    filter: &FileFilter,
    domain: Domain,
) -> Result<Vec<PathBuf>> {
    let root = &config.project_root;

    let mut files = match domain {
        Domain::Code => walk_tree(root, root, Some(filter))?,
        Domain::Docs => {
            let mut files = walk_tree(&root.join(&config.docs_dir), root, None)?;
            if root.join(&config.instructions_file).is_file() {
                files.push(config.instructions_file.clone());
            }
            files
        }
        Domain::Skills => walk_tree(&root.join(&config.skills_dir), root, None)?,
    };

    files.retain(|rel| filter.accepts(domain, rel));
    files.sort();
    Ok(files)
}

/// Walk `dir`, returning paths relative to `root`. When a filter is
/// given, ignored directories are pruned early so dependency trees are
/// never descended into.
fn walk_tree(dir: &Path, root: &Path, filter: Option<&FileFilter>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        match (filter, entry.path().strip_prefix(root)) {
            (Some(f), Ok(rel)) if !rel.as_os_str().is_empty() => !f.is_ignored_dir(rel),
            _ => true,
        }
    });

    for entry in walker {
        let entry = entry.context("failed to walk project tree")?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }

    Ok(files)
}
