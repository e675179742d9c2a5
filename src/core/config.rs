//! Configuration management with layered hierarchy

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::core::Project;

/// Which project a record falls back to when it omits `project_id`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum ProjectFallback {
    /// The project with the lowest id
    #[default]
    First,
    /// A fixed project id, used only if that project is in the cache
    Fixed(String),
    /// Never fall back; records without a project are skipped
    Disabled,
}

impl From<String> for ProjectFallback {
    fn from(s: String) -> Self {
        match s.trim() {
            "first" => ProjectFallback::First,
            "none" | "" => ProjectFallback::Disabled,
            other => ProjectFallback::Fixed(other.to_string()),
        }
    }
}

impl FromStr for ProjectFallback {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.to_string().into())
    }
}

impl fmt::Display for ProjectFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectFallback::First => write!(f, "first"),
            ProjectFallback::Fixed(id) => write!(f, "{}", id),
            ProjectFallback::Disabled => write!(f, "none"),
        }
    }
}

/// When the batch scanner re-parses a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResyncPolicy {
    /// Re-parse every file on every sync
    #[default]
    Always,
    /// Skip files whose stored hash and size still match
    Changed,
}

impl FromStr for ResyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(ResyncPolicy::Always),
            "changed" => Ok(ResyncPolicy::Changed),
            _ => Err(format!("Unknown resync policy: {}", s)),
        }
    }
}

/// Roadmap configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_fallback: Option<ProjectFallback>,

    pub resync: Option<ResyncPolicy>,

    /// Backend checked by `validate-links` when none is given
    pub default_backend: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Global user config (~/.config/roadmap/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            config.merge_file(&global_path);
        }

        // 2. Project config (.roadmap/config.yaml)
        if let Some(project) = project {
            config.merge_file(&project.roadmap_dir().join("config.yaml"));
        }

        // 3. Environment variables
        if let Ok(fallback) = std::env::var("ROADMAP_PROJECT_FALLBACK") {
            config.project_fallback = Some(fallback.into());
        }
        if let Ok(resync) = std::env::var("ROADMAP_RESYNC") {
            match resync.parse() {
                Ok(policy) => config.resync = Some(policy),
                Err(e) => tracing::warn!("ignoring ROADMAP_RESYNC: {}", e),
            }
        }
        if let Ok(backend) = std::env::var("ROADMAP_BACKEND") {
            config.default_backend = Some(backend);
        }

        config
    }

    fn merge_file(&mut self, path: &std::path::Path) {
        if !path.exists() {
            return;
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|contents| {
                serde_yml::from_str::<Option<Config>>(&contents).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(Some(other)) => self.merge(other),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable config: {}", e),
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "roadmap")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.project_fallback.is_some() {
            self.project_fallback = other.project_fallback;
        }
        if other.resync.is_some() {
            self.resync = other.resync;
        }
        if other.default_backend.is_some() {
            self.default_backend = other.default_backend;
        }
    }

    pub fn project_fallback(&self) -> ProjectFallback {
        self.project_fallback.clone().unwrap_or_default()
    }

    pub fn resync(&self) -> ResyncPolicy {
        self.resync.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_fallback_parsing() {
        assert_eq!(ProjectFallback::from("first".to_string()), ProjectFallback::First);
        assert_eq!(ProjectFallback::from("none".to_string()), ProjectFallback::Disabled);
        assert_eq!(
            ProjectFallback::from("core".to_string()),
            ProjectFallback::Fixed("core".to_string())
        );
    }

    #[test]
    fn test_resync_parsing() {
        assert_eq!("Changed".parse::<ResyncPolicy>().unwrap(), ResyncPolicy::Changed);
        assert!("sometimes".parse::<ResyncPolicy>().is_err());
    }

    #[test]
    fn test_yaml_deserialize() {
        let config: Config =
            serde_yml::from_str("project_fallback: core\nresync: changed\n").unwrap();
        assert_eq!(config.project_fallback(), ProjectFallback::Fixed("core".into()));
        assert_eq!(config.resync(), ResyncPolicy::Changed);
        assert!(config.default_backend.is_none());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            project_fallback: Some(ProjectFallback::First),
            resync: Some(ResyncPolicy::Always),
            default_backend: Some("github".into()),
        };
        base.merge(Config {
            project_fallback: None,
            resync: Some(ResyncPolicy::Changed),
            default_backend: None,
        });
        assert_eq!(base.project_fallback(), ProjectFallback::First);
        assert_eq!(base.resync(), ResyncPolicy::Changed);
        assert_eq!(base.default_backend.as_deref(), Some("github"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.project_fallback(), ProjectFallback::First);
        assert_eq!(config.resync(), ResyncPolicy::Always);
    }

    #[test]
    fn test_load_reads_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        std::fs::write(
            project.roadmap_dir().join("config.yaml"),
            "default_backend: gitlab\n",
        )
        .unwrap();

        let config = Config::load(Some(&project));
        if std::env::var("ROADMAP_BACKEND").is_err() {
            assert_eq!(config.default_backend.as_deref(), Some("gitlab"));
        }
    }
}
