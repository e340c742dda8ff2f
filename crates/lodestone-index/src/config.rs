//! Engine configuration.

use std::path::PathBuf;

/// Configuration for the retrieval engine.
///
/// `project_name` namespaces the three Qdrant collections so different
/// projects sharing one server never collide.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory of the project to index
    pub project_root: PathBuf,
    /// Logical project name used to namespace collections
    pub project_name: String,
    /// Qdrant server URL
    pub qdrant_url: String,
    /// Qdrant API key (optional)
    pub qdrant_api_key: Option<String>,
    /// Embedding API endpoint (OpenAI-compatible)
    pub embedding_url: String,
    /// Embedding API key (optional)
    pub embedding_api_key: Option<String>,
    /// Embedding model name
    pub embedding_model: String,
    /// Vector dimensions (must match the embedding model output)
    pub dimensions: usize,
    /// Documentation directory, relative to the project root
    pub docs_dir: PathBuf,
    /// Top-level instructions file, relative to the project root
    pub instructions_file: PathBuf,
    /// Skills directory, relative to the project root
    pub skills_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            project_name: "lodestone".to_string(),
            qdrant_url: crate::DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            embedding_url: "https://api.openai.com/v1/embeddings".to_string(),
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            dimensions: crate::DEFAULT_DIMENSIONS,
            docs_dir: PathBuf::from("docs"),
            instructions_file: PathBuf::from("AGENTS.md"),
            skills_dir: PathBuf::from("skills"),
        }
    }
}

impl EngineConfig {
    /// Create a configuration for a project rooted at `root`.
    pub fn for_project(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            project_root: root.into(),
            project_name: name.into(),
            ..Default::default()
        }
    }

    /// Set the Qdrant server URL.
    pub fn with_qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.qdrant_url = url.into();
        self
    }

    /// Set the embedding endpoint, model and dimensions together, since
    /// the three must agree.
    pub fn with_embedding_model(
        mut self,
        url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        self.embedding_url = url.into();
        self.embedding_model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Set the documentation directory.
    pub fn with_docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.docs_dir = dir.into();
        self
    }

    /// Set the skills directory.
    pub fn with_skills_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skills_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.project_root, PathBuf::from("."));
        assert_eq!(config.qdrant_url, crate::DEFAULT_QDRANT_URL);
        assert_eq!(config.dimensions, crate::DEFAULT_DIMENSIONS);
        assert_eq!(config.docs_dir, PathBuf::from("docs"));
        assert_eq!(config.skills_dir, PathBuf::from("skills"));
        assert!(config.qdrant_api_key.is_none());
    }

    #[test]
    fn test_for_project() {
        let config = EngineConfig::for_project("/tmp/proj", "proj");
        assert_eq!(config.project_root, PathBuf::from("/tmp/proj"));
        assert_eq!(config.project_name, "proj");
    }

    #[test]
    fn test_builder_setters() {
        let config = EngineConfig::default()
            .with_qdrant_url("http://qdrant:6334")
            .with_embedding_model("http://localhost:8080/v1/embeddings", "bge-small", 384)
            .with_docs_dir("documentation")
            .with_skills_dir("playbooks");

        assert_eq!(config.qdrant_url, "http://qdrant:6334");
        assert_eq!(config.embedding_model, "bge-small");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.docs_dir, PathBuf::from("documentation"));
        assert_eq!(config.skills_dir, PathBuf::from("playbooks"));
    }
}
