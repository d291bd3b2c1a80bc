//! Entity reference resolution across unrelated modules
//!
//! Each entity kind registers an accessor under its kind tag. The resolver
//! itself knows nothing about individual kinds, so adding a module means
//! adding one registration call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::core::entity::{Entity, Record, Referable};
use crate::core::identity::EntityReference;

/// Lookup capability for one entity kind
pub trait EntityAccessor: Send + Sync {
    /// Find a live entity by id
    fn find(&self, id: &str) -> Option<Box<dyn Record>>;

    /// Every live entity of this kind, in the kind's natural query order
    fn all(&self) -> Vec<Box<dyn Record>>;
}

/// Why a reference did not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// No accessor is registered for the kind
    UnknownKind,
    /// The kind is known but no entity has this id (deleted or never existed)
    NotFound,
}

/// Outcome of resolving a reference
pub enum Resolved {
    Found(Box<dyn Record>),
    Missing(Miss),
}

impl Resolved {
    pub fn is_missing(&self) -> bool {
        matches!(self, Resolved::Missing(_))
    }

    /// Convert into the found record, discarding the miss reason
    pub fn found(self) -> Option<Box<dyn Record>> {
        match self {
            Resolved::Found(record) => Some(record),
            Resolved::Missing(_) => None,
        }
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Found(record) => write!(f, "Found({})", record.reference()),
            Resolved::Missing(miss) => write!(f, "Missing({:?})", miss),
        }
    }
}

/// Registry of accessors keyed by kind tag
#[derive(Default)]
pub struct EntityResolver {
    accessors: HashMap<String, Arc<dyn EntityAccessor>>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the accessor for an entity type under its own kind tag
    pub fn register<E: Entity>(&mut self, accessor: impl EntityAccessor + 'static) -> &mut Self {
        self.register_kind(E::KIND, accessor)
    }

    /// Register an accessor under an explicit kind tag
    ///
    /// A second registration for the same kind replaces the first.
    pub fn register_kind(
        &mut self,
        kind: &str,
        accessor: impl EntityAccessor + 'static,
    ) -> &mut Self {
        if self
            .accessors
            .insert(kind.to_string(), Arc::new(accessor))
            .is_some()
        {
            tracing::warn!(kind, "entity accessor replaced");
        }
        self
    }

    /// Look up the entity a reference points at
    ///
    /// Never fails: unknown kinds and dangling ids come back as [`Resolved::Missing`].
    pub fn resolve(&self, reference: &EntityReference) -> Resolved {
        let Some(accessor) = self.accessors.get(&reference.kind) else {
            tracing::debug!(%reference, "no accessor for kind");
            return Resolved::Missing(Miss::UnknownKind);
        };

        match accessor.find(&reference.id) {
            Some(record) => Resolved::Found(record),
            None => Resolved::Missing(Miss::NotFound),
        }
    }

    /// Accessor registered for a kind, if any
    pub fn accessor(&self, kind: &str) -> Option<Arc<dyn EntityAccessor>> {
        self.accessors.get(kind).cloned()
    }

    /// Registered kind tags in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// In-memory accessor backed by a shared map
///
/// Cloning the accessor shares the underlying map, so a caller can keep one
/// handle to insert/remove entities after registering another.
pub struct MemoryAccessor<E> {
    items: Arc<RwLock<BTreeMap<String, E>>>,
}

impl<E> Clone for MemoryAccessor<E> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<E> Default for MemoryAccessor<E> {
    fn default() -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<E: Entity + Record + Clone + Send + Sync + 'static> MemoryAccessor<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, returning `false` if the map is unavailable
    pub fn insert(&self, entity: E) -> bool {
        match self.items.write() {
            Ok(mut items) => {
                items.insert(entity.entity_id(), entity);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove an entity by id, returning it if it existed
    pub fn remove(&self, id: &str) -> Option<E> {
        self.items.write().ok()?.remove(id)
    }
}

impl<E: Entity + Record + Clone + Send + Sync + 'static> EntityAccessor for MemoryAccessor<E> {
    fn find(&self, id: &str) -> Option<Box<dyn Record>> {
        let items = self.items.read().ok()?;
        items
            .get(id)
            .cloned()
            .map(|entity| Box::new(entity) as Box<dyn Record>)
    }

    fn all(&self) -> Vec<Box<dyn Record>> {
        match self.items.read() {
            Ok(items) => items
                .values()
                .cloned()
                .map(|entity| Box::new(entity) as Box<dyn Record>)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
