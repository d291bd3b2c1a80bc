//! Immutable audit trail of who did what to which entity
//!
//! Logging never blocks the operation that triggered it: [`ActivityLogger::log`]
//! swallows store failures after reporting them through `tracing`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::entity::Referable;
use crate::core::identity::{EntityId, EntityPrefix, EntityReference};
use crate::core::store::{retention_cutoff, timestamp_now, ActivityQuery, Store, StoreError};

/// Key under which `log_update` stores its change map
pub const CHANGES_KEY: &str = "changes";

/// What happened; an open set of uppercase tags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    View,
    Export,
    Custom(String),
}

impl ActivityAction {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityAction::Create => "CREATE",
            ActivityAction::Update => "UPDATE",
            ActivityAction::Delete => "DELETE",
            ActivityAction::View => "VIEW",
            ActivityAction::Export => "EXPORT",
            ActivityAction::Custom(tag) => tag,
        }
    }

    /// Build an action from any tag; well-known tags map to their variants
    pub fn custom(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref().trim().to_uppercase();
        match tag.as_str() {
            "CREATE" => ActivityAction::Create,
            "UPDATE" => ActivityAction::Update,
            "DELETE" => ActivityAction::Delete,
            "VIEW" => ActivityAction::View,
            "EXPORT" => ActivityAction::Export,
            _ => ActivityAction::Custom(tag),
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("activity action cannot be empty".to_string());
        }
        Ok(ActivityAction::custom(s))
    }
}

impl Serialize for ActivityAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a request came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Origin {
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.agent.is_none()
    }
}

/// A persisted audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityLogEntry {
    pub id: EntityId,
    pub actor: String,
    pub action: ActivityAction,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityReference>,
    pub extra_data: Map<String, Value>,
    #[serde(skip_serializing_if = "Origin::is_empty")]
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    /// The field change map recorded by an update, if any
    pub fn changes(&self) -> Option<&Map<String, Value>> {
        self.extra_data.get(CHANGES_KEY).and_then(Value::as_object)
    }
}

/// An entry about to be written
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub actor: String,
    pub action: ActivityAction,
    pub entity: Option<EntityReference>,
    pub description: String,
    pub extra_data: Map<String, Value>,
    pub origin: Origin,
}

impl ActivityEvent {
    pub fn new(actor: impl Into<String>, action: ActivityAction) -> Self {
        Self {
            actor: actor.into(),
            action,
            entity: None,
            description: String::new(),
            extra_data: Map::new(),
            origin: Origin::default(),
        }
    }

    pub fn about<R: Referable + ?Sized>(mut self, entity: &R) -> Self {
        self.entity = Some(entity.reference());
        self
    }

    pub fn reference(mut self, reference: EntityReference) -> Self {
        self.entity = Some(reference);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_data.insert(key.into(), value.into());
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    fn into_entry(self, now: DateTime<Utc>) -> ActivityLogEntry {
        ActivityLogEntry {
            id: EntityId::new(EntityPrefix::Act),
            actor: self.actor,
            action: self.action,
            description: self.description,
            entity: self.entity,
            extra_data: self.extra_data,
            origin: self.origin,
            created_at: now,
        }
    }
}

/// Field-level diff: `field -> [old, new]`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, [Value; 2]>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn change(
        mut self,
        field: impl Into<String>,
        old: impl Into<Value>,
        new: impl Into<Value>,
    ) -> Self {
        self.0.insert(field.into(), [old.into(), new.into()]);
        self
    }

    /// Top-level fields that differ between two snapshots
    ///
    /// Both sides are serialized to JSON; a field present on only one side
    /// is reported with `null` on the other.
    pub fn between<T: Serialize>(before: &T, after: &T) -> Result<Self, serde_json::Error> {
        let before = object_of(serde_json::to_value(before)?);
        let after = object_of(serde_json::to_value(after)?);

        let mut changes = BTreeMap::new();
        for key in before.keys().chain(after.keys()) {
            if changes.contains_key(key) {
                continue;
            }
            let old = before.get(key).cloned().unwrap_or(Value::Null);
            let new = after.get(key).cloned().unwrap_or(Value::Null);
            if old != new {
                changes.insert(key.clone(), [old, new]);
            }
        }
        Ok(Self(changes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn into_value(self) -> Value {
        Value::Object(
            self.0
                .into_iter()
                .map(|(field, [old, new])| (field, Value::Array(vec![old, new])))
                .collect(),
        )
    }
}

fn object_of(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Failures of [`ActivityLogger::try_log`]
#[derive(Debug, Error, Diagnostic)]
pub enum ActivityError {
    #[error("activity action cannot be empty")]
    #[diagnostic(code(floor::activity::empty_action))]
    EmptyAction,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Writes and queries the audit trail
pub struct ActivityLogger<'s> {
    store: &'s Store,
}

impl<'s> ActivityLogger<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Record an event; a failed write is reported and yields `None`
    pub fn log(&self, event: ActivityEvent) -> Option<ActivityLogEntry> {
        let actor = event.actor.clone();
        let action = event.action.clone();
        match self.try_log(event) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::error!(%actor, %action, error = %e, "failed to record activity");
                None
            }
        }
    }

    /// Record an event, returning the store error to the caller
    pub fn try_log(&self, event: ActivityEvent) -> Result<ActivityLogEntry, ActivityError> {
        // Stored tags must parse back, so normalise them the way reads do
        let action = ActivityAction::custom(event.action.as_str());
        if action.as_str().is_empty() {
            return Err(ActivityError::EmptyAction);
        }
        let entry = ActivityEvent { action, ..event }.into_entry(timestamp_now());
        self.store.insert_activity(&entry)?;
        tracing::debug!(
            id = %entry.id,
            actor = %entry.actor,
            action = %entry.action,
            "activity recorded"
        );
        Ok(entry)
    }

    pub fn log_create<R: Referable + ?Sized>(
        &self,
        actor: &str,
        entity: &R,
        description: impl Into<String>,
    ) -> Option<ActivityLogEntry> {
        self.log(
            ActivityEvent::new(actor, ActivityAction::Create)
                .about(entity)
                .description(description),
        )
    }

    /// Record an update with its field change map under `changes`
    pub fn log_update<R: Referable + ?Sized>(
        &self,
        actor: &str,
        entity: &R,
        changes: ChangeSet,
        description: impl Into<String>,
    ) -> Option<ActivityLogEntry> {
        self.log(
            ActivityEvent::new(actor, ActivityAction::Update)
                .about(entity)
                .description(description)
                .extra(CHANGES_KEY, changes.into_value()),
        )
    }

    pub fn log_delete<R: Referable + ?Sized>(
        &self,
        actor: &str,
        entity: &R,
        description: impl Into<String>,
    ) -> Option<ActivityLogEntry> {
        self.log(
            ActivityEvent::new(actor, ActivityAction::Delete)
                .about(entity)
                .description(description),
        )
    }

    pub fn log_view<R: Referable + ?Sized>(&self, actor: &str, entity: &R) -> Option<ActivityLogEntry> {
        self.log(ActivityEvent::new(actor, ActivityAction::View).about(entity))
    }

    pub fn log_export(
        &self,
        actor: &str,
        kind: &str,
        rows: usize,
        format: &str,
    ) -> Option<ActivityLogEntry> {
        self.log(
            ActivityEvent::new(actor, ActivityAction::Export)
                .description(format!("Exported {rows} {kind} rows as {format}"))
                .extra("entity_kind", kind)
                .extra("rows", rows)
                .extra("format", format),
        )
    }

    /// Newest-first entries, optionally for one actor
    pub fn recent_for(
        &self,
        actor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.store.recent_activity(&ActivityQuery {
            actor: actor.map(str::to_string),
            entity: None,
            limit,
        })
    }

    /// Newest-first entries about one entity
    pub fn recent_for_entity(
        &self,
        reference: &EntityReference,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.store.recent_activity(&ActivityQuery {
            actor: None,
            entity: Some(reference.clone()),
            limit,
        })
    }

    /// Delete entries older than the given number of days
    pub fn cleanup(&self, older_than_days: u32) -> Result<usize, StoreError> {
        self.cleanup_before(&retention_cutoff(older_than_days))
    }

    pub fn cleanup_before(&self, cutoff: &DateTime<Utc>) -> Result<usize, StoreError> {
        let removed = self.store.delete_activity_before(cutoff)?;
        tracing::info!(removed, cutoff = %cutoff, "activity retention cleanup");
        Ok(removed)
    }
}
