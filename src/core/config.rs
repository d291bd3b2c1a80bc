//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::export::{ExportFormat, DEFAULT_PDF_ROW_CAP};
use crate::core::Project;

/// Read notifications older than this are removed by cleanup
pub const DEFAULT_NOTIFICATION_RETENTION_DAYS: u32 = 30;

/// Activity entries older than this are removed by cleanup
pub const DEFAULT_ACTIVITY_RETENTION_DAYS: u32 = 90;

/// Floor configuration with layered hierarchy
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Acting identity when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_retention_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_retention_days: Option<u32>,

    /// Maximum rows written to a PDF export
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_row_cap: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_export_format: Option<ExportFormat>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Global user config (~/.config/floor/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::load_from_path(&global_path) {
                config.merge(global);
            }
        }

        // 2. Project config (.floor/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::load_from_path(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // 3. Environment variables
        if let Ok(actor) = std::env::var("FLOOR_ACTOR") {
            if !actor.trim().is_empty() {
                config.actor = Some(actor);
            }
        }
        if let Ok(cap) = std::env::var("FLOOR_PDF_ROW_CAP") {
            match cap.parse() {
                Ok(cap) => config.pdf_row_cap = Some(cap),
                Err(_) => tracing::warn!(value = %cap, "ignoring invalid FLOOR_PDF_ROW_CAP"),
            }
        }

        config
    }

    /// Read one config file; missing or unreadable files yield `None`
    pub fn load_from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "floor")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.actor.is_some() {
            self.actor = other.actor;
        }
        if other.notification_retention_days.is_some() {
            self.notification_retention_days = other.notification_retention_days;
        }
        if other.activity_retention_days.is_some() {
            self.activity_retention_days = other.activity_retention_days;
        }
        if other.pdf_row_cap.is_some() {
            self.pdf_row_cap = other.pdf_row_cap;
        }
        if other.default_export_format.is_some() {
            self.default_export_format = other.default_export_format;
        }
    }

    /// Get the acting identity, falling back to git config or username
    pub fn actor(&self) -> String {
        if let Some(ref actor) = self.actor {
            return actor.clone();
        }

        // Try git config
        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        // Fall back to username
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn notification_retention_days(&self) -> u32 {
        self.notification_retention_days
            .unwrap_or(DEFAULT_NOTIFICATION_RETENTION_DAYS)
    }

    pub fn activity_retention_days(&self) -> u32 {
        self.activity_retention_days
            .unwrap_or(DEFAULT_ACTIVITY_RETENTION_DAYS)
    }

    pub fn pdf_row_cap(&self) -> usize {
        self.pdf_row_cap.unwrap_or(DEFAULT_PDF_ROW_CAP)
    }

    pub fn default_export_format(&self) -> ExportFormat {
        self.default_export_format.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.notification_retention_days(), 30);
        assert_eq!(config.activity_retention_days(), 90);
        assert_eq!(config.pdf_row_cap(), 1000);
        assert_eq!(config.default_export_format(), ExportFormat::Csv);
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let mut config = Config {
            actor: Some("global".into()),
            pdf_row_cap: Some(500),
            ..Config::default()
        };
        config.merge(Config {
            actor: Some("project".into()),
            activity_retention_days: Some(365),
            ..Config::default()
        });

        assert_eq!(config.actor(), "project");
        assert_eq!(config.pdf_row_cap(), 500);
        assert_eq!(config.activity_retention_days(), 365);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "actor: sam\npdf_row_cap: 250\ndefault_export_format: xlsx\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.actor.as_deref(), Some("sam"));
        assert_eq!(config.pdf_row_cap(), 250);
        assert_eq!(config.default_export_format(), ExportFormat::Spreadsheet);
    }

    #[test]
    fn test_unreadable_config_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "pdf_row_cap: [not, a, number]\n").unwrap();
        assert!(Config::load_from_path(&path).is_none());
        assert!(Config::load_from_path(&dir.path().join("missing.yaml")).is_none());
    }
}
