//! Integration tests for the lodestone-index crate.
//!
//! These exercise the filter -> chunker pipeline over real file trees
//! and the engine's degraded mode. Tests that need a live Qdrant server
//! live behind the caller's deployment, not here.

use std::collections::HashSet;
use std::fs;

use tempfile::tempdir;

use lodestone_index::indexer::collect_domain_chunks;
use lodestone_index::{Domain, EngineConfig, EngineError, FileFilter, RetrievalEngine, SearchOptions};

/// Build a small but realistic project tree.
fn write_project(root: &std::path::Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("docs/api")).unwrap();
    fs::create_dir_all(root.join("skills")).unwrap();
    fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
    fs::create_dir_all(root.join("target/debug")).unwrap();

    let source: String = (1..=250).map(|i| format!("// line {}\n", i)).collect();
    fs::write(root.join("src/big.rs"), source).unwrap();
    fs::write(root.join("src/small.py"), "def f():\n    return 1\n").unwrap();

    fs::write(
        root.join("docs/guide.md"),
        "# Getting started\ninstall it\n## Configuration\nedit the file\n",
    )
    .unwrap();
    fs::write(root.join("docs/api/reference.md"), "# API\ncall things\n").unwrap();
    fs::write(root.join("AGENTS.md"), "# Conventions\nbe consistent\n").unwrap();

    fs::write(
        root.join("skills/deploy.md"),
        "---\nname: deploy\ndescription: Ship to production\n---\n# Steps\nbuild, then push\n",
    )
    .unwrap();

    fs::write(root.join("node_modules/left-pad/index.js"), "module.exports = 1;\n").unwrap();
    fs::write(root.join("target/debug/gen.rs"), "fn gen() {}\n").unwrap();
    fs::write(root.join("Cargo.lock"), "[[package]]\nname = \"x\"\n").unwrap();
}

#[test]
fn test_full_pipeline_over_project_tree() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let filter = FileFilter::new(&config).unwrap();

    let code = collect_domain_chunks(&config, &filter, Domain::Code).unwrap();
    let docs = collect_domain_chunks(&config, &filter, Domain::Docs).unwrap();
    let skills = collect_domain_chunks(&config, &filter, Domain::Skills).unwrap();

    // 250-line file windows into 4 chunks, the 2-line file into 1.
    let big_chunks: Vec<_> = code
        .chunks
        .iter()
        .filter(|c| c.metadata.path == "src/big.rs")
        .collect();
    assert_eq!(big_chunks.len(), 4);
    assert_eq!(big_chunks[0].metadata.start_line, Some(1));
    assert_eq!(big_chunks[3].metadata.start_line, Some(241));
    assert_eq!(big_chunks[3].metadata.end_line, Some(250));
    assert_eq!(code.documents, 2);

    // Docs include the nested file and the instructions file.
    let doc_paths: HashSet<&str> = docs.chunks.iter().map(|c| c.metadata.path.as_str()).collect();
    assert_eq!(
        doc_paths,
        HashSet::from(["docs/guide.md", "docs/api/reference.md", "AGENTS.md"])
    );

    // Skill front matter lands on every chunk.
    assert!(!skills.chunks.is_empty());
    for chunk in &skills.chunks {
        assert_eq!(
            chunk.metadata.extra.get("description").map(String::as_str),
            Some("Ship to production")
        );
    }
}

#[test]
fn test_ignore_enforcement_across_domains() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let filter = FileFilter::new(&config).unwrap();

    for domain in Domain::ALL {
        let batch = collect_domain_chunks(&config, &filter, domain).unwrap();
        for chunk in &batch.chunks {
            let path = std::path::Path::new(&chunk.metadata.path);
            assert!(
                !filter.is_ignored(path),
                "indexed an excluded path: {}",
                chunk.metadata.path
            );
            assert!(!chunk.metadata.path.contains("node_modules"));
            assert!(!chunk.metadata.path.contains("target/"));
            assert!(!chunk.metadata.path.ends_with(".lock"));
        }
    }
}

#[test]
fn test_reindex_is_idempotent() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let filter = FileFilter::new(&config).unwrap();

    for domain in Domain::ALL {
        let first = collect_domain_chunks(&config, &filter, domain).unwrap();
        let second = collect_domain_chunks(&config, &filter, domain).unwrap();
        assert_eq!(first.chunks, second.chunks, "{} pass differed", domain);
    }
}

#[test]
fn test_removed_file_leaves_no_chunks() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let filter = FileFilter::new(&config).unwrap();

    let before = collect_domain_chunks(&config, &filter, Domain::Code).unwrap();
    assert!(before.chunks.iter().any(|c| c.metadata.path == "src/small.py"));

    fs::remove_file(dir.path().join("src/small.py")).unwrap();

    // The collection is wholly replaced by this set on reindex, so the
    // removed file leaves no residue.
    let after = collect_domain_chunks(&config, &filter, Domain::Code).unwrap();
    assert!(after.chunks.iter().all(|c| c.metadata.path != "src/small.py"));
}

#[test]
fn test_chunk_ids_unique_within_domain() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let filter = FileFilter::new(&config).unwrap();

    for domain in Domain::ALL {
        let batch = collect_domain_chunks(&config, &filter, domain).unwrap();
        let ids: HashSet<&str> = batch.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), batch.chunks.len());
    }
}

#[tokio::test]
async fn test_degraded_engine_never_panics() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    let config = EngineConfig::for_project(dir.path(), "proj");
    let engine = RetrievalEngine::detached(config).unwrap();

    assert!(matches!(
        engine.index().await,
        Err(EngineError::BackendUnavailable)
    ));
    assert!(matches!(
        engine.search("deploy steps", SearchOptions::default()).await,
        Err(EngineError::BackendUnavailable)
    ));
    assert!(matches!(
        engine.stats().await,
        Err(EngineError::BackendUnavailable)
    ));
}

#[tokio::test]
async fn test_connect_with_unreachable_backend_degrades() {
    let dir = tempdir().unwrap();
    write_project(dir.path());

    // Nothing listens on this port; connect must come up degraded
    // instead of failing.
    let config = EngineConfig::for_project(dir.path(), "proj")
        .with_qdrant_url("http://127.0.0.1:1");

    let engine = RetrievalEngine::connect(config).await.unwrap();
    assert!(!engine.is_available());
    assert!(matches!(
        engine.stats().await,
        Err(EngineError::BackendUnavailable)
    ));
}
