//! Identity system: type-prefixed ULIDs and polymorphic entity references

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Record type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    /// Employee record
    Emp,
    /// Production job card
    Job,
    /// Leave request
    Lve,
    /// Notification row
    Ntf,
    /// Activity log entry
    Act,
}

impl EntityPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Emp => "EMP",
            EntityPrefix::Job => "JOB",
            EntityPrefix::Lve => "LVE",
            EntityPrefix::Ntf => "NTF",
            EntityPrefix::Act => "ACT",
        }
    }

    /// Get all valid prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Emp,
            EntityPrefix::Job,
            EntityPrefix::Lve,
            EntityPrefix::Ntf,
            EntityPrefix::Act,
        ]
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EMP" => Ok(EntityPrefix::Emp),
            "JOB" => Ok(EntityPrefix::Job),
            "LVE" => Ok(EntityPrefix::Lve),
            "NTF" => Ok(EntityPrefix::Ntf),
            "ACT" => Ok(EntityPrefix::Act),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique identifier combining a type prefix and ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Create a new EntityId with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Get the prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing record IDs
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid id prefix: '{0}' (valid: EMP, JOB, LVE, NTF, ACT)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in id: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

/// A weak, polymorphic pointer to an entity in any module
///
/// Stored as two plain columns (kind tag, identifier). Holding a reference
/// never keeps the entity alive; resolution may come back missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityReference {
    pub kind: String,
    pub id: String,
}

impl EntityReference {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Rebuild a reference from its two storage columns
    ///
    /// Both columns must be present; a half-populated pair is treated as no reference.
    pub fn from_columns(kind: Option<String>, id: Option<String>) -> Option<Self> {
        match (kind, id) {
            (Some(kind), Some(id)) => Some(Self { kind, id }),
            _ => None,
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for EntityReference {
    type Err = RefParseError;

    /// Parse the `Kind:id` form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| RefParseError::MissingDelimiter(s.to_string()))?;
        let kind = kind.trim();
        let id = id.trim();
        if kind.is_empty() {
            return Err(RefParseError::EmptyKind(s.to_string()));
        }
        if id.is_empty() {
            return Err(RefParseError::EmptyId(s.to_string()));
        }
        Ok(Self::new(kind, id))
    }
}

/// Errors that can occur when parsing an entity reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefParseError {
    #[error("missing ':' in entity reference '{0}' (expected Kind:id)")]
    MissingDelimiter(String),

    #[error("empty kind in entity reference '{0}'")]
    EmptyKind(String),

    #[error("empty id in entity reference '{0}'")]
    EmptyId(String),
}
