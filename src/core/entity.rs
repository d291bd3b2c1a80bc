//! Entity capabilities shared by every business module
//!
//! Nothing here enumerates entity kinds. A type takes part in references,
//! resolution and export by implementing [`Entity`] and [`Record`].

use serde_json::Value;
use thiserror::Error;

use crate::core::identity::EntityReference;

/// A business entity with a stable type tag and identifier
pub trait Entity {
    /// The kind tag used as the first half of an [`EntityReference`]
    ///
    /// This is persisted, so it must never change once records exist.
    const KIND: &'static str;

    /// Identifier within this kind's namespace
    fn entity_id(&self) -> String;
}

/// Stable kind tag for an entity type
pub fn kind_of<E: Entity>() -> &'static str {
    E::KIND
}

/// Anything that can produce an [`EntityReference`] to itself
pub trait Referable {
    fn reference(&self) -> EntityReference;
}

impl<E: Entity> Referable for E {
    fn reference(&self) -> EntityReference {
        EntityReference::new(E::KIND, self.entity_id())
    }
}

/// Derive the (kind, id) pair for any referable entity
pub fn make_reference<R: Referable + ?Sized>(entity: &R) -> EntityReference {
    entity.reference()
}

/// The target of a relation step in a field path
pub enum Related<'a> {
    /// Relation is empty for this record
    Null,
    /// Related record is held inline
    Embedded(&'a dyn Record),
    /// Related record lives elsewhere and must be resolved
    Reference(EntityReference),
}

/// A named derivation failed for one record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("derivation '{name}' failed: {message}")]
pub struct DerivationError {
    pub name: String,
    pub message: String,
}

impl DerivationError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Field-level access used by the resolver and the exporter
///
/// Each method returns `None` when the name is not known to the record,
/// which lets a field path fall through attribute -> derivation.
pub trait Record: Referable {
    /// Stored attribute value
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Relation to another record
    fn relation(&self, _name: &str) -> Option<Related<'_>> {
        None
    }

    /// Zero-argument computed value
    fn derive(&self, _name: &str) -> Option<Result<Value, DerivationError>> {
        None
    }
}
