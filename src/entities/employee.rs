//! EMP entity type - workshop staff record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::entity::{DerivationError, Entity, Record};
use crate::core::identity::{EntityId, EntityPrefix};

/// An employee of the workshop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier (EMP-...)
    pub id: EntityId,

    /// Payroll number
    pub employee_no: String,

    pub first_name: String,
    pub last_name: String,

    /// Roster account, if the employee logs in; notifications go here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    /// First working day
    pub hired: NaiveDate,

    #[serde(default = "default_active")]
    pub active: bool,

    pub created: DateTime<Utc>,
    pub author: String,
}

fn default_active() -> bool {
    true
}

impl Employee {
    pub fn new(
        employee_no: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        hired: NaiveDate,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Emp),
            employee_no: employee_no.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: None,
            department: None,
            position: None,
            hired,
            active: true,
            created: Utc::now(),
            author: author.into(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Days employed as of `today`
    pub fn tenure_days(&self, today: NaiveDate) -> Result<i64, DerivationError> {
        let days = (today - self.hired).num_days();
        if days < 0 {
            return Err(DerivationError::new(
                "tenure_days",
                format!("hire date {} is in the future", self.hired),
            ));
        }
        Ok(days)
    }
}

impl Entity for Employee {
    const KIND: &'static str = "Employee";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl Record for Employee {
    fn attribute(&self, name: &str) -> Option<Value> {
        Some(match name {
            "id" => json!(self.id.to_string()),
            "employee_no" => json!(self.employee_no),
            "first_name" => json!(self.first_name),
            "last_name" => json!(self.last_name),
            "username" => json!(self.username),
            "department" => json!(self.department),
            "position" => json!(self.position),
            "hired" => json!(self.hired.to_string()),
            "active" => json!(self.active),
            "created" => json!(self.created.to_rfc3339()),
            "author" => json!(self.author),
            _ => return None,
        })
    }

    fn derive(&self, name: &str) -> Option<Result<Value, DerivationError>> {
        match name {
            "display_name" => Some(Ok(json!(self.display_name()))),
            "tenure_days" => Some(self.tenure_days(Utc::now().date_naive()).map(|d| json!(d))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_employee_yaml_roundtrip() {
        let mut emp = Employee::new("E-104", "Ana", "Silva", date(2021, 5, 3), "hr");
        emp.department = Some("Machining".into());

        let yaml = serde_yml::to_string(&emp).unwrap();
        let parsed: Employee = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, emp);
        assert!(!yaml.contains("username"));
    }

    #[test]
    fn test_derivations() {
        let emp = Employee::new("E-104", "Ana", "Silva", date(2021, 5, 3), "hr");
        assert_eq!(emp.derive("display_name").unwrap().unwrap(), json!("Ana Silva"));
        assert_eq!(emp.tenure_days(date(2021, 5, 13)).unwrap(), 10);
        assert!(emp.tenure_days(date(2021, 5, 1)).is_err());
        assert!(emp.derive("salary").is_none());
    }

    #[test]
    fn test_attributes() {
        let emp = Employee::new("E-104", "Ana", "Silva", date(2021, 5, 3), "hr");
        assert_eq!(emp.attribute("hired"), Some(json!("2021-05-03")));
        assert_eq!(emp.attribute("username"), Some(Value::Null));
        assert!(emp.attribute("display_name").is_none());
    }
}
