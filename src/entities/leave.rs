//! LVE entity type - leave request

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::entity::{DerivationError, Entity, Record, Related};
use crate::core::identity::{EntityId, EntityPrefix, EntityReference};
use crate::entities::Employee;

/// Leave request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaveStatus::Pending => write!(f, "pending"),
            LeaveStatus::Approved => write!(f, "approved"),
            LeaveStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A request for time off, decided by a supervisor or manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Unique identifier (LVE-...)
    pub id: EntityId,

    /// Requesting employee (EMP-...)
    pub employee: String,

    pub start: NaiveDate,
    pub end: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub status: LeaveStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_note: Option<String>,

    pub created: DateTime<Utc>,
    pub author: String,
}

impl LeaveRequest {
    pub fn new(
        employee: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Lve),
            employee: employee.into(),
            start,
            end,
            reason: None,
            status: LeaveStatus::Pending,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            created: Utc::now(),
            author: author.into(),
        }
    }

    pub fn employee_reference(&self) -> EntityReference {
        EntityReference::new(Employee::KIND, self.employee.clone())
    }

    /// Calendar days covered, inclusive of both ends
    pub fn days(&self) -> Result<i64, DerivationError> {
        let span = (self.end - self.start).num_days();
        if span < 0 {
            return Err(DerivationError::new(
                "days",
                format!("leave ends ({}) before it starts ({})", self.end, self.start),
            ));
        }
        Ok(span + 1)
    }
}

impl Entity for LeaveRequest {
    const KIND: &'static str = "LeaveRequest";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for LeaveRequest {
    fn attribute(&self, name: &str) -> Option<Value> {
        Some(match name {
            "id" => json!(self.id.to_string()),
            "start" => json!(self.start.to_string()),
            "end" => json!(self.end.to_string()),
            "reason" => json!(self.reason),
            "status" => json!(self.status.to_string()),
            "decided_by" => json!(self.decided_by),
            "decided_at" => json!(self.decided_at.map(|t| t.to_rfc3339())),
            "decision_note" => json!(self.decision_note),
            "created" => json!(self.created.to_rfc3339()),
            "author" => json!(self.author),
            _ => return None,
        })
    }

    fn relation(&self, name: &str) -> Option<Related<'_>> {
        match name {
            "employee" => Some(Related::Reference(self.employee_reference())),
            _ => None,
        }
    }

    fn derive(&self, name: &str) -> Option<Result<Value, DerivationError>> {
        match name {
            "days" => Some(self.days().map(|d| json!(d))),
            _ => None,
        }
    }
}
