//! Entity loading utilities
//!
//! Workshop records live as one YAML file per entity. These helpers load and
//! save them, and [`YamlAccessor`] exposes a directory to the resolver.

use miette::{IntoDiagnostic, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::entity::{Entity, Record};
use crate::core::project::ENTITY_FILE_SUFFIX;
use crate::core::resolver::EntityAccessor;

fn is_entity_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ENTITY_FILE_SUFFIX))
}

/// An id that names a file inside its kind's directory and nothing else
fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

fn entity_files(dir: &Path) -> Vec<PathBuf> {
    // ULIDs sort by creation time, so name order is creation order
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_entity_file(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Load all entities of type T from a directory
///
/// Files that fail to parse are skipped with a warning.
pub fn load_all<T: DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut entities = Vec::new();

    for path in entity_files(dir) {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_yml::from_str::<T>(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(entity) => entities.push(entity),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record"),
        }
    }

    entities
}

/// Find an entity file by ID (supports partial matching)
///
/// Returns the first file whose name starts with the given ID.
pub fn find_entity_file(dir: &Path, id: &str) -> Option<PathBuf> {
    if !is_plain_id(id) {
        return None;
    }
    let exact = dir.join(format!("{}{}", id, ENTITY_FILE_SUFFIX));
    if exact.is_file() {
        return Some(exact);
    }

    let wanted = id.to_uppercase();
    entity_files(dir).into_iter().find(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_uppercase().starts_with(&wanted))
    })
}

/// Load a single entity by ID
///
/// Searches for an entity file matching the ID and deserializes it.
/// Returns the path and entity if found.
pub fn load_entity<T: DeserializeOwned>(dir: &Path, id: &str) -> Result<Option<(PathBuf, T)>> {
    if let Some(path) = find_entity_file(dir, id) {
        let content = fs::read_to_string(&path).into_diagnostic()?;
        let entity: T = serde_yml::from_str(&content).into_diagnostic()?;
        return Ok(Some((path, entity)));
    }
    Ok(None)
}

/// Write an entity to `<dir>/<id>.floor.yaml`
pub fn save_entity<T: Entity + Serialize>(dir: &Path, entity: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir).into_diagnostic()?;
    let path = dir.join(format!("{}{}", entity.entity_id(), ENTITY_FILE_SUFFIX));
    let yaml = serde_yml::to_string(entity).into_diagnostic()?;
    fs::write(&path, yaml).into_diagnostic()?;
    Ok(path)
}

/// Resolver accessor over a directory of YAML records
pub struct YamlAccessor<E> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> E>,
}

impl<E> YamlAccessor<E> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _marker: PhantomData,
        }
    }
}

impl<E> EntityAccessor for YamlAccessor<E>
where
    E: Entity + Record + DeserializeOwned + 'static,
{
    fn find(&self, id: &str) -> Option<Box<dyn Record>> {
        // Resolution is exact; partial matching is for interactive lookup only
        if !is_plain_id(id) {
            return None;
        }
        let path = self.dir.join(format!("{}{}", id, ENTITY_FILE_SUFFIX));
        let content = fs::read_to_string(&path).ok()?;
        match serde_yml::from_str::<E>(&content) {
            Ok(entity) => Some(Box::new(entity)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable record");
                None
            }
        }
    }

    fn all(&self) -> Vec<Box<dyn Record>> {
        load_all::<E>(&self.dir)
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Record>)
            .collect()
    }
}
