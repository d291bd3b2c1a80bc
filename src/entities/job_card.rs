//! JOB entity type - production job card

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::entity::{DerivationError, Entity, Record, Related};
use crate::core::identity::{EntityId, EntityPrefix, EntityReference};
use crate::entities::Employee;

/// Job card status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Open,
    InProgress,
    OnHold,
    Done,
    Cancelled,
}

impl JobStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Open => write!(f, "open"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::OnHold => write!(f, "on_hold"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(JobStatus::Open),
            "in_progress" | "inprogress" => Ok(JobStatus::InProgress),
            "on_hold" | "onhold" => Ok(JobStatus::OnHold),
            "done" => Ok(JobStatus::Done),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(format!(
                "Invalid job status: {}. Use open, in_progress, on_hold, done, or cancelled",
                s
            )),
        }
    }
}

/// A unit of work on the floor, such as re-cutting a batch of bits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCard {
    /// Unique identifier (JOB-...)
    pub id: EntityId,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: JobStatus,

    /// Assigned employee (EMP-...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Units to produce
    #[serde(default)]
    pub quantity: u32,

    #[serde(default)]
    pub hours_logged: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,

    pub created: DateTime<Utc>,
    pub author: String,
}

impl JobCard {
    pub fn new(title: impl Into<String>, quantity: u32, author: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Job),
            title: title.into(),
            description: None,
            status: JobStatus::Open,
            assignee: None,
            quantity,
            hours_logged: 0.0,
            due: None,
            created: Utc::now(),
            author: author.into(),
        }
    }

    pub fn assignee_reference(&self) -> Option<EntityReference> {
        self.assignee
            .as_ref()
            .map(|id| EntityReference::new(Employee::KIND, id.clone()))
    }

    pub fn hours_per_unit(&self) -> Result<f64, DerivationError> {
        if self.quantity == 0 {
            return Err(DerivationError::new("hours_per_unit", "quantity is zero"));
        }
        Ok(self.hours_logged / f64::from(self.quantity))
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_closed() && self.due.is_some_and(|due| due < today)
    }
}

impl Entity for JobCard {
    const KIND: &'static str = "JobCard";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for JobCard {
    fn attribute(&self, name: &str) -> Option<Value> {
        Some(match name {
            "id" => json!(self.id.to_string()),
            "title" => json!(self.title),
            "description" => json!(self.description),
            "status" => json!(self.status.to_string()),
            "quantity" => json!(self.quantity),
            "hours_logged" => json!(self.hours_logged),
            "due" => json!(self.due.map(|d| d.to_string())),
            "created" => json!(self.created.to_rfc3339()),
            "author" => json!(self.author),
            _ => return None,
        })
    }

    fn relation(&self, name: &str) -> Option<Related<'_>> {
        match name {
            "assignee" => Some(match self.assignee_reference() {
                Some(reference) => Related::Reference(reference),
                None => Related::Null,
            }),
            _ => None,
        }
    }

    fn derive(&self, name: &str) -> Option<Result<Value, DerivationError>> {
        match name {
            "hours_per_unit" => Some(self.hours_per_unit().map(|h| json!(h))),
            "is_overdue" => Some(Ok(json!(self.is_overdue(Utc::now().date_naive())))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("IN_PROGRESS".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("canceled".parse::<JobStatus>().unwrap(), JobStatus::Cancelled);
        assert_eq!(JobStatus::OnHold.to_string(), "on_hold");
        assert!("finished".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_hours_per_unit_fails_on_zero_quantity() {
        let mut job = JobCard::new("Re-cut PDC bits", 4, "sam");
        job.hours_logged = 10.0;
        assert_eq!(job.hours_per_unit().unwrap(), 2.5);

        job.quantity = 0;
        assert!(matches!(job.derive("hours_per_unit"), Some(Err(_))));
    }

    #[test]
    fn test_assignee_relation() {
        let mut job = JobCard::new("Braze inserts", 1, "sam");
        assert!(matches!(job.relation("assignee"), Some(Related::Null)));

        job.assignee = Some("EMP-01J0000000000000000000000A".into());
        match job.relation("assignee") {
            Some(Related::Reference(r)) => {
                assert_eq!(r.kind, "Employee");
                assert_eq!(r.id, "EMP-01J0000000000000000000000A");
            }
            _ => panic!("expected a reference"),
        }
    }

    #[test]
    fn test_overdue_ignores_closed_jobs() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let mut job = JobCard::new("Inspect", 1, "sam");
        job.due = NaiveDate::from_ymd_opt(2026, 5, 1);
        assert!(job.is_overdue(today));
        job.status = JobStatus::Done;
        assert!(!job.is_overdue(today));
    }
}
