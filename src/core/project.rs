//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::EntityPrefix;

/// Marker directory that identifies a project root
pub const FLOOR_DIR: &str = ".floor";

/// Suffix of every entity record file
pub const ENTITY_FILE_SUFFIX: &str = ".floor.yaml";

/// Represents a floor project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .floor/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(FLOOR_DIR).is_dir() {
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

        if root.join(FLOOR_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        Self::write_structure(root)
    }

    /// Force initialization even if .floor/ exists
    ///
    /// Rewrites the default config; the store and roster are left alone.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::write_structure(root)
    }

    fn write_structure(root: PathBuf) -> Result<Self, ProjectError> {
        let floor_dir = root.join(FLOOR_DIR);
        std::fs::create_dir_all(&floor_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(floor_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Self::create_entity_dirs(&root)?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Floor Project Configuration

# Acting identity when --actor and FLOOR_ACTOR are not set
# actor: ""

# Retention horizons used by `floor notify cleanup` and `floor activity cleanup`
# notification_retention_days: 30
# activity_retention_days: 90

# Exports
# pdf_row_cap: 1000
# default_export_format: csv
"#
    }

    fn create_entity_dirs(root: &Path) -> Result<(), ProjectError> {
        for prefix in EntityPrefix::all() {
            if let Some(dir) = Self::entity_directory(*prefix) {
                std::fs::create_dir_all(root.join(dir))
                    .map_err(|e| ProjectError::IoError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .floor configuration directory
    pub fn floor_dir(&self) -> PathBuf {
        self.root.join(FLOOR_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.floor_dir().join("config.yaml")
    }

    /// Directory holding records of a prefix; `None` for store-only rows
    pub fn entity_directory(prefix: EntityPrefix) -> Option<&'static str> {
        match prefix {
            EntityPrefix::Emp => Some("hr/employees"),
            EntityPrefix::Lve => Some("hr/leave_requests"),
            EntityPrefix::Job => Some("production/job_cards"),
            EntityPrefix::Ntf | EntityPrefix::Act => None,
        }
    }

    /// Absolute directory for a prefix's records
    pub fn entity_dir(&self, prefix: EntityPrefix) -> Option<PathBuf> {
        Self::entity_directory(prefix).map(|dir| self.root.join(dir))
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a floor project (searched from {searched_from:?}). Run 'floor init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("floor project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
