//! Project discovery and layout
//!
//! A roadmap project is any directory containing `.roadmap/`. Entity files
//! live in `.roadmap/{projects,milestones,issues}/` as Markdown with a YAML
//! frontmatter block; the cache database sits next to them.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::cache::EntityKind;

/// Name of the project metadata directory
pub const ROADMAP_DIR: &str = ".roadmap";

/// Represents a roadmap project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .roadmap/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(ROADMAP_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(ROADMAP_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        let project = Self { root };
        project.create_layout()?;
        Ok(project)
    }

    fn create_layout(&self) -> Result<(), ProjectError> {
        for kind in [EntityKind::Project, EntityKind::Milestone, EntityKind::Issue] {
            std::fs::create_dir_all(self.entity_dir(kind))
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        let config_path = self.roadmap_dir().join("config.yaml");
        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_config())
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        let gitignore = self.roadmap_dir().join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, "cache.db\ncache.db-*\n")
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        Ok(())
    }

    fn default_config() -> &'static str {
        r#"# Roadmap project configuration

# Which project an issue or milestone falls back to when it has no
# project_id: "first" (lowest project id), "none", or a fixed project id.
# project_fallback: first

# When to re-parse files during `roadmap cache sync`: "always" or "changed".
# resync: always

# Backend checked by `roadmap validate-links` when --backend is omitted.
# Leave unset to check every backend found.
# default_backend: github
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .roadmap directory
    pub fn roadmap_dir(&self) -> PathBuf {
        self.root.join(ROADMAP_DIR)
    }

    /// Directory holding files of one entity kind
    pub fn entity_dir(&self, kind: EntityKind) -> PathBuf {
        self.roadmap_dir().join(kind.directory())
    }

    pub fn issues_dir(&self) -> PathBuf {
        self.entity_dir(EntityKind::Issue)
    }

    /// Iterate all Markdown files of a given entity kind, sorted by path
    pub fn iter_entity_files(&self, kind: EntityKind) -> impl Iterator<Item = PathBuf> {
        markdown_files(&self.entity_dir(kind))
    }
}

/// Markdown files under `dir`, recursively, sorted by path
pub fn markdown_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .map(|e| e.path().to_path_buf())
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a roadmap project (searched from {searched_from:?}). Run 'roadmap init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("roadmap project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.roadmap_dir().join("config.yaml").exists());
        assert!(project.issues_dir().is_dir());
        assert!(project.entity_dir(EntityKind::Milestone).is_dir());
        assert!(project.entity_dir(EntityKind::Project).is_dir());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }

    #[test]
    fn test_project_discover_finds_roadmap_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_roadmap_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn test_iter_entity_files_only_markdown() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let issues = project.issues_dir();
        std::fs::create_dir_all(issues.join("sprint-1")).unwrap();
        std::fs::write(issues.join("issue-b.md"), "").unwrap();
        std::fs::write(issues.join("sprint-1/issue-a.md"), "").unwrap();
        std::fs::write(issues.join("notes.txt"), "").unwrap();

        let files: Vec<_> = project.iter_entity_files(EntityKind::Issue).collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.extension().unwrap() == "md"));
    }
}
