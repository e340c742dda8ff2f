//! Eligibility policy for indexable files.
//!
//! Code files pass an extension allowlist and an ignore set (project
//! `.gitignore` plus hard-coded defaults). Docs and skills are filtered
//! by directory membership instead, markdown only.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::Domain;

/// Source-code extensions eligible for the code domain.
pub const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "rb", "c", "h", "cpp", "hpp", "cc", "cs",
    "swift", "kt", "scala", "php", "sh",
];

/// Always-ignored patterns, unioned with the project's own `.gitignore`.
/// Covers dependency/build output, VCS state, the engine's own local
/// state directory, lock files, and minified/map artifacts.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    "out/",
    ".git/",
    "vendor/",
    "__pycache__/",
    ".venv/",
    "venv/",
    ".lodestone/",
    "*.lock",
    "package-lock.json",
    "*.min.js",
    "*.min.css",
    "*.map",
];

/// Pure accept/reject predicate over project-relative paths.
///
/// Reading the ignore file happens once in [`FileFilter::new`]; the
/// per-file predicates never touch the filesystem.
pub struct FileFilter {
    ignore: Gitignore,
    docs_dir: PathBuf,
    instructions_file: PathBuf,
    skills_dir: PathBuf,
}

impl FileFilter {
    /// Build the filter for a project, unioning the default ignore set
    /// with the project's `.gitignore` if one exists.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(&config.project_root);

        for pattern in DEFAULT_IGNORE_PATTERNS {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("invalid default ignore pattern: {}", pattern))?;
        }

        let gitignore_path = config.project_root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(err) = builder.add(&gitignore_path) {
                debug!("Ignoring unreadable .gitignore: {}", err);
            }
        }

        let ignore = builder.build().context("failed to build ignore set")?;

        Ok(Self {
            ignore,
            docs_dir: config.docs_dir.clone(),
            instructions_file: config.instructions_file.clone(),
            skills_dir: config.skills_dir.clone(),
        })
    }

    /// Whether a project-relative path is eligible for the given domain.
    pub fn accepts(&self, domain: Domain, path: &Path) -> bool {
        match domain {
            Domain::Code => self.accepts_code(path),
            Domain::Docs => self.accepts_doc(path),
            Domain::Skills => self.accepts_skill(path),
        }
    }

    /// Code: allowlisted extension and not ignored.
    pub fn accepts_code(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        CODE_EXTENSIONS.contains(&ext) && !self.is_ignored(path)
    }

    /// Docs: under the docs directory or the instructions file itself.
    pub fn accepts_doc(&self, path: &Path) -> bool {
        if !is_markdown(path) {
            return false;
        }
        path.starts_with(&self.docs_dir) || path == self.instructions_file
    }

    /// Skills: any markdown file under the skills directory.
    pub fn accepts_skill(&self, path: &Path) -> bool {
        is_markdown(path) && path.starts_with(&self.skills_dir)
    }

    /// Whether a project-relative path matches the ignore set.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.matched_path_or_any_parents(path, false).is_ignore()
    }

    /// Directory variant, used to prune walks early.
    pub fn is_ignored_dir(&self, path: &Path) -> bool {
        self.ignore.matched_path_or_any_parents(path, true).is_ignore()
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> FileFilter {
        let config = EngineConfig::for_project("/nonexistent", "test");
        FileFilter::new(&config).unwrap()
    }

    #[test]
    fn test_code_extension_allowlist() {
        let f = filter();
        assert!(f.accepts_code(Path::new("src/main.rs")));
        assert!(f.accepts_code(Path::new("lib/util.py")));
        assert!(f.accepts_code(Path::new("web/app.tsx")));
        assert!(!f.accepts_code(Path::new("assets/logo.png")));
        assert!(!f.accepts_code(Path::new("README.md")));
        assert!(!f.accepts_code(Path::new("Makefile")));
    }

    #[test]
    fn test_default_ignores() {
        let f = filter();
        assert!(f.is_ignored(Path::new("node_modules/react/index.js")));
        assert!(f.is_ignored(Path::new("target/debug/build.rs")));
        assert!(f.is_ignored(Path::new("Cargo.lock")));
        assert!(f.is_ignored(Path::new("package-lock.json")));
        assert!(f.is_ignored(Path::new("dist/app.min.js")));
        assert!(f.is_ignored(Path::new("app.js.map")));
        assert!(f.is_ignored(Path::new(".lodestone/state.json")));
        assert!(!f.is_ignored(Path::new("src/main.rs")));
    }

    #[test]
    fn test_ignored_code_rejected() {
        let f = filter();
        assert!(!f.accepts_code(Path::new("node_modules/react/index.js")));
        assert!(!f.accepts_code(Path::new("vendor/lib.go")));
    }

    #[test]
    fn test_docs_membership() {
        let f = filter();
        assert!(f.accepts_doc(Path::new("docs/guide.md")));
        assert!(f.accepts_doc(Path::new("docs/nested/api.md")));
        assert!(f.accepts_doc(Path::new("AGENTS.md")));
        assert!(!f.accepts_doc(Path::new("README.md")));
        assert!(!f.accepts_doc(Path::new("docs/diagram.png")));
    }

    #[test]
    fn test_skills_membership() {
        let f = filter();
        assert!(f.accepts_skill(Path::new("skills/review.md")));
        assert!(f.accepts_skill(Path::new("skills/sub/deploy.md")));
        assert!(!f.accepts_skill(Path::new("skills/helper.py")));
        assert!(!f.accepts_skill(Path::new("docs/guide.md")));
    }

    #[test]
    fn test_project_gitignore_union() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "generated/\nsecret.rs\n").unwrap();

        let config = EngineConfig::for_project(dir.path(), "test");
        let f = FileFilter::new(&config).unwrap();

        assert!(f.is_ignored(Path::new("generated/code.rs")));
        assert!(f.is_ignored(Path::new("secret.rs")));
        // Defaults still apply alongside the project file.
        assert!(f.is_ignored(Path::new("node_modules/x.js")));
        assert!(!f.is_ignored(Path::new("src/main.rs")));
    }

    #[test]
    fn test_accepts_dispatch() {
        let f = filter();
        assert!(f.accepts(Domain::Code, Path::new("src/main.rs")));
        assert!(f.accepts(Domain::Docs, Path::new("docs/a.md")));
        assert!(f.accepts(Domain::Skills, Path::new("skills/a.md")));
        assert!(!f.accepts(Domain::Code, Path::new("docs/a.md")));
    }
}
