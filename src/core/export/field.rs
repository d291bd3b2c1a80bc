//! Field path evaluation against records
//!
//! A path is a dot-separated list of segments. Every segment but the last
//! names a relation; the last names an attribute or a derivation. A trailing
//! `()` skips the attribute lookup and calls the derivation directly.

use serde_json::Value;

use super::ExportError;
use crate::core::entity::{Record, Related};
use crate::core::resolver::{EntityResolver, Resolved};

fn is_identifier(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
    forced_derivation: bool,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        let trimmed = raw.trim();
        let (body, forced_derivation) = match trimmed.strip_suffix("()") {
            Some(body) => (body, true),
            None => (trimmed, false),
        };

        let segments: Vec<String> = body.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(|s| !is_identifier(s)) {
            return Err(ExportError::InvalidField(raw.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
            forced_derivation,
        })
    }

    /// The path as written, used as the default header
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Evaluate this path against one record
    pub fn evaluate(&self, record: &dyn Record, resolver: &EntityResolver) -> Cell {
        self.walk(record, &self.segments, resolver)
    }

    fn walk(&self, record: &dyn Record, segments: &[String], resolver: &EntityResolver) -> Cell {
        let (name, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Cell::Empty,
        };

        if rest.is_empty() {
            return self.leaf(record, name);
        }

        match record.relation(name) {
            Some(Related::Embedded(next)) => self.walk(next, rest, resolver),
            Some(Related::Reference(reference)) => match resolver.resolve(&reference) {
                Resolved::Found(next) => self.walk(next.as_ref(), rest, resolver),
                Resolved::Missing(miss) => {
                    tracing::debug!(path = %self.raw, %reference, ?miss, "dangling reference");
                    Cell::Empty
                }
            },
            Some(Related::Null) | None => Cell::Empty,
        }
    }

    fn leaf(&self, record: &dyn Record, name: &str) -> Cell {
        if !self.forced_derivation {
            if let Some(value) = record.attribute(name) {
                return Cell::Value(value);
            }
        }

        match record.derive(name) {
            Some(Ok(value)) => Cell::Value(value),
            Some(Err(e)) => {
                tracing::warn!(path = %self.raw, error = %e, "derivation failed");
                Cell::Failed
            }
            None => Cell::Empty,
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The outcome of evaluating one path for one record
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Empty,
    /// A derivation raised; rendered empty and counted
    Failed,
}

impl Cell {
    pub fn is_failed(&self) -> bool {
        matches!(self, Cell::Failed)
    }

    /// Text form used by CSV, PDF and filters
    pub fn render(&self) -> String {
        match self {
            Cell::Value(value) => render_value(value),
            Cell::Empty | Cell::Failed => String::new(),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => value.to_string(),
    }
}
