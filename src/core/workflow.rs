//! Workshop workflows for status transitions and approvals
//!
//! Every mutation of a workshop record goes through [`Workshop`], which saves
//! the record, writes one audit entry and notifies the people involved.

use chrono::Utc;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::activity::{ActivityLogger, ChangeSet};
use crate::core::identity::EntityPrefix;
use crate::core::loader::{load_all, load_entity, save_entity};
use crate::core::notify::{Dispatcher, NotificationDraft, NotificationKind, NotifyError, Priority};
use crate::core::project::Project;
use crate::core::store::Store;
use crate::core::team::{Actor, TeamRoster};
use crate::entities::{Employee, JobCard, JobStatus, LeaveRequest, LeaveStatus};

/// Errors from workshop workflows
#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    #[error("{kind} not found: {id}")]
    #[diagnostic(code(floor::workflow::not_found))]
    NotFound { kind: &'static str, id: String },

    #[error("invalid status transition from {from} to {to}")]
    #[diagnostic(code(floor::workflow::invalid_transition))]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("leave request {id} was already {status}")]
    #[diagnostic(code(floor::workflow::already_decided))]
    AlreadyDecided { id: String, status: LeaveStatus },

    #[error("leave cannot end before it starts")]
    #[diagnostic(code(floor::workflow::invalid_dates))]
    InvalidDates,

    #[error("{actor} is not allowed to {action}")]
    #[diagnostic(
        code(floor::workflow::unauthorized),
        help("a supervisor, manager or admin on the team roster must do this")
    )]
    Unauthorized { actor: String, action: String },

    #[error("record error: {0}")]
    #[diagnostic(code(floor::workflow::record))]
    Record(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Notify(#[from] NotifyError),
}

impl From<miette::Report> for WorkflowError {
    fn from(report: miette::Report) -> Self {
        WorkflowError::Record(report.to_string())
    }
}

/// Check if a job status transition is valid
pub fn is_valid_transition(from: JobStatus, to: JobStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Get allowed transitions from the current status
pub fn allowed_transitions(current: JobStatus) -> Vec<JobStatus> {
    match current {
        JobStatus::Open => vec![JobStatus::InProgress, JobStatus::OnHold, JobStatus::Cancelled],
        JobStatus::InProgress => vec![JobStatus::OnHold, JobStatus::Done, JobStatus::Cancelled],
        JobStatus::OnHold => vec![JobStatus::InProgress, JobStatus::Cancelled],
        JobStatus::Done | JobStatus::Cancelled => vec![],
    }
}

/// Record mutations with their audit and notification side effects
pub struct Workshop<'a> {
    project: &'a Project,
    store: &'a Store,
    roster: &'a TeamRoster,
}

impl<'a> Workshop<'a> {
    pub fn new(project: &'a Project, store: &'a Store, roster: &'a TeamRoster) -> Self {
        Self {
            project,
            store,
            roster,
        }
    }

    fn dispatcher(&self) -> Dispatcher<'a> {
        Dispatcher::new(self.store)
    }

    fn logger(&self) -> ActivityLogger<'a> {
        ActivityLogger::new(self.store)
    }

    fn dir(&self, prefix: EntityPrefix) -> Result<PathBuf, WorkflowError> {
        self.project
            .entity_dir(prefix)
            .ok_or_else(|| WorkflowError::Record(format!("{prefix} records are not file-backed")))
    }

    // ---- employees -------------------------------------------------------

    /// Save a new employee and tell the administrators
    pub fn hire(&self, actor: &Actor, employee: Employee) -> Result<Employee, WorkflowError> {
        save_entity(&self.dir(EntityPrefix::Emp)?, &employee)?;
        self.logger().log_create(
            &actor.name,
            &employee,
            format!("Added employee {}", employee.display_name()),
        );

        self.dispatcher().notify_administrators(
            self.roster,
            &NotificationDraft::new(
                "New employee",
                format!(
                    "{} ({}) was added by {}",
                    employee.display_name(),
                    employee.employee_no,
                    actor.name
                ),
            )
            .about(&employee)
            .created_by(actor.name.clone()),
        )?;
        Ok(employee)
    }

    pub fn employees(&self) -> Result<Vec<Employee>, WorkflowError> {
        Ok(load_all(&self.dir(EntityPrefix::Emp)?))
    }

    pub fn employee(&self, id: &str) -> Result<Employee, WorkflowError> {
        load_entity::<Employee>(&self.dir(EntityPrefix::Emp)?, id)?
            .map(|(_, employee)| employee)
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "Employee",
                id: id.to_string(),
            })
    }

    /// Load an employee record and audit the read
    pub fn view_employee(&self, actor: &Actor, id: &str) -> Result<Employee, WorkflowError> {
        let employee = self.employee(id)?;
        self.logger().log_view(&actor.name, &employee);
        Ok(employee)
    }

    fn username_of(&self, employee_id: &str) -> Option<String> {
        self.employee(employee_id).ok().and_then(|e| e.username)
    }

    // ---- job cards -------------------------------------------------------

    /// Save a new job card and notify its assignee
    pub fn open_job(&self, actor: &Actor, job: JobCard) -> Result<JobCard, WorkflowError> {
        if let Some(assignee) = &job.assignee {
            self.employee(assignee)?;
        }

        save_entity(&self.dir(EntityPrefix::Job)?, &job)?;
        self.logger()
            .log_create(&actor.name, &job, format!("Opened job card '{}'", job.title));

        if let Some(username) = job.assignee.as_deref().and_then(|a| self.username_of(a)) {
            self.dispatcher().dispatch(
                [username],
                &NotificationDraft::new(
                    format!("Job assigned: {}", job.title),
                    format!("{} assigned you {} unit(s)", actor.name, job.quantity),
                )
                .kind(NotificationKind::Task)
                .about(&job)
                .created_by(actor.name.clone()),
            )?;
        }
        Ok(job)
    }

    pub fn jobs(&self) -> Result<Vec<JobCard>, WorkflowError> {
        Ok(load_all(&self.dir(EntityPrefix::Job)?))
    }

    pub fn job(&self, id: &str) -> Result<JobCard, WorkflowError> {
        load_entity::<JobCard>(&self.dir(EntityPrefix::Job)?, id)?
            .map(|(_, job)| job)
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "JobCard",
                id: id.to_string(),
            })
    }

    /// Move a job card to a new status
    pub fn set_job_status(
        &self,
        actor: &Actor,
        id: &str,
        status: JobStatus,
        hours_logged: Option<f64>,
    ) -> Result<JobCard, WorkflowError> {
        let before = self.job(id)?;
        if before.status != status && !is_valid_transition(before.status, status) {
            return Err(WorkflowError::InvalidTransition {
                from: before.status,
                to: status,
            });
        }

        let mut after = before.clone();
        after.status = status;
        if let Some(hours) = hours_logged {
            after.hours_logged = hours;
        }

        let changes = ChangeSet::between(&before, &after)
            .map_err(|e| WorkflowError::Record(e.to_string()))?;
        if changes.is_empty() {
            return Ok(after);
        }

        save_entity(&self.dir(EntityPrefix::Job)?, &after)?;
        self.logger().log_update(
            &actor.name,
            &after,
            changes,
            format!("Job card '{}' is now {}", after.title, after.status),
        );

        let mut recipients: Vec<String> = after
            .assignee
            .as_deref()
            .and_then(|a| self.username_of(a))
            .into_iter()
            .collect();
        if !recipients.contains(&after.author) {
            recipients.push(after.author.clone());
        }
        recipients.retain(|r| *r != actor.name);

        let kind = match status {
            JobStatus::Done => NotificationKind::Success,
            JobStatus::OnHold | JobStatus::Cancelled => NotificationKind::Warning,
            _ => NotificationKind::Info,
        };
        self.dispatcher().dispatch(
            recipients,
            &NotificationDraft::new(
                format!("Job {}: {}", after.status, after.title),
                format!("{} moved the job from {} to {}", actor.name, before.status, after.status),
            )
            .kind(kind)
            .about(&after)
            .created_by(actor.name.clone()),
        )?;
        Ok(after)
    }

    // ---- leave requests --------------------------------------------------

    /// File a leave request and ask the elevated accounts to decide it
    pub fn request_leave(
        &self,
        actor: &Actor,
        leave: LeaveRequest,
    ) -> Result<LeaveRequest, WorkflowError> {
        if leave.end < leave.start {
            return Err(WorkflowError::InvalidDates);
        }
        let employee = self.employee(&leave.employee)?;

        save_entity(&self.dir(EntityPrefix::Lve)?, &leave)?;
        self.logger().log_create(
            &actor.name,
            &leave,
            format!("Leave requested for {}", employee.display_name()),
        );

        self.dispatcher().notify_elevated(
            self.roster,
            &NotificationDraft::new(
                format!("Leave request from {}", employee.display_name()),
                format!("{} to {}", leave.start, leave.end),
            )
            .kind(NotificationKind::Approval)
            .priority(Priority::High)
            .about(&leave)
            .action(format!("floor leave decide {}", leave.id), "Decide")
            .created_by(actor.name.clone()),
        )?;
        Ok(leave)
    }

    /// Approve or reject a pending leave request
    pub fn decide_leave(
        &self,
        actor: &Actor,
        id: &str,
        approve: bool,
        note: Option<String>,
    ) -> Result<LeaveRequest, WorkflowError> {
        let may_decide =
            actor.admin || self.roster.find_member(&actor.name).is_some_and(|m| m.is_elevated());
        if !may_decide {
            return Err(WorkflowError::Unauthorized {
                actor: actor.name.clone(),
                action: "decide leave requests".to_string(),
            });
        }

        let dir = self.dir(EntityPrefix::Lve)?;
        let before = load_entity::<LeaveRequest>(&dir, id)?
            .map(|(_, leave)| leave)
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "LeaveRequest",
                id: id.to_string(),
            })?;
        if before.status != LeaveStatus::Pending {
            return Err(WorkflowError::AlreadyDecided {
                id: before.id.to_string(),
                status: before.status,
            });
        }

        let mut after = before.clone();
        after.status = if approve {
            LeaveStatus::Approved
        } else {
            LeaveStatus::Rejected
        };
        after.decided_by = Some(actor.name.clone());
        after.decided_at = Some(Utc::now());
        after.decision_note = note;

        let changes = ChangeSet::between(&before, &after)
            .map_err(|e| WorkflowError::Record(e.to_string()))?;
        save_entity(&dir, &after)?;
        self.logger().log_update(
            &actor.name,
            &after,
            changes,
            format!("Leave request {}", after.status),
        );

        if let Some(username) = self.username_of(&after.employee) {
            self.dispatcher().dispatch(
                [username],
                &NotificationDraft::new(
                    format!("Leave {}", after.status),
                    format!("{} to {} was {} by {}", after.start, after.end, after.status, actor.name),
                )
                .kind(if approve {
                    NotificationKind::Success
                } else {
                    NotificationKind::Warning
                })
                .about(&after)
                .created_by(actor.name.clone()),
            )?;
        }
        Ok(after)
    }

    pub fn leave_requests(&self) -> Result<Vec<LeaveRequest>, WorkflowError> {
        Ok(load_all(&self.dir(EntityPrefix::Lve)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activity::ActivityAction;
    use crate::core::entity::Referable;
    use crate::core::team::{Role, TeamMember};
    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tmp: TempDir,
        project: Project,
        store: Store,
        roster: TeamRoster,
    }

    fn member(username: &str, roles: &[Role]) -> TeamMember {
        TeamMember {
            username: username.into(),
            name: username.into(),
            email: None,
            roles: roles.to_vec(),
            active: true,
        }
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        Fixture {
            _tmp: tmp,
            project,
            store: Store::open_in_memory().unwrap(),
            roster: TeamRoster {
                version: 1,
                members: vec![
                    member("root", &[Role::Admin]),
                    member("sam", &[Role::Supervisor]),
                    member("ana", &[Role::Technician]),
                ],
            },
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn ana() -> Employee {
        let mut emp = Employee::new("E-7", "Ana", "Silva", date(1), "hr");
        emp.username = Some("ana".into());
        emp
    }

    #[test]
    fn test_transitions() {
        assert!(is_valid_transition(JobStatus::Open, JobStatus::InProgress));
        assert!(is_valid_transition(JobStatus::InProgress, JobStatus::Done));
        assert!(!is_valid_transition(JobStatus::Open, JobStatus::Done));
        assert!(allowed_transitions(JobStatus::Done).is_empty());
    }

    #[test]
    fn test_hire_logs_and_notifies_admins() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let emp = shop.hire(&Actor::user("hr"), ana()).unwrap();

        assert_eq!(shop.employees().unwrap(), vec![emp.clone()]);
        assert_eq!(f.store.count_unread("root", &Utc::now()).unwrap(), 1);
        assert_eq!(f.store.count_unread("sam", &Utc::now()).unwrap(), 0);

        let log = ActivityLogger::new(&f.store)
            .recent_for_entity(&emp.reference(), 5)
            .unwrap();
        assert_eq!(log[0].action, ActivityAction::Create);
    }

    #[test]
    fn test_job_lifecycle_notifies_assignee() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let emp = shop.hire(&Actor::user("hr"), ana()).unwrap();

        let mut job = JobCard::new("Re-cut PDC bits", 4, "sam");
        job.assignee = Some(emp.id.to_string());
        let job = shop.open_job(&Actor::user("sam"), job).unwrap();
        assert_eq!(f.store.count_unread("ana", &Utc::now()).unwrap(), 1);

        let sam = Actor::user("sam");
        let id = job.id.to_string();
        shop.set_job_status(&sam, &id, JobStatus::InProgress, None)
            .unwrap();
        let done = shop
            .set_job_status(&sam, &id, JobStatus::Done, Some(6.0))
            .unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(shop.job(&id).unwrap().hours_logged, 6.0);
        assert_eq!(f.store.count_unread("ana", &Utc::now()).unwrap(), 3);
        // The actor is never notified about their own change
        assert_eq!(f.store.count_unread("sam", &Utc::now()).unwrap(), 0);

        let update = ActivityLogger::new(&f.store)
            .recent_for_entity(&done.reference(), 1)
            .unwrap()
            .remove(0);
        let changes = update.changes().unwrap();
        assert_eq!(changes["status"], serde_json::json!(["in_progress", "done"]));
        assert_eq!(changes["hours_logged"], serde_json::json!([0.0, 6.0]));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let job = shop
            .open_job(&Actor::user("sam"), JobCard::new("Inspect", 1, "sam"))
            .unwrap();

        let err = shop
            .set_job_status(&Actor::user("sam"), &job.id.to_string(), JobStatus::Done, None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn test_open_job_requires_known_assignee() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let mut job = JobCard::new("Inspect", 1, "sam");
        job.assignee = Some("EMP-01J0000000000000000000000Z".into());

        assert!(matches!(
            shop.open_job(&Actor::user("sam"), job),
            Err(WorkflowError::NotFound { kind: "Employee", .. })
        ));
    }

    #[test]
    fn test_leave_request_and_decision() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let emp = shop.hire(&Actor::user("hr"), ana()).unwrap();

        let leave = shop
            .request_leave(
                &Actor::user("ana"),
                LeaveRequest::new(emp.id.to_string(), date(10), date(14), "ana"),
            )
            .unwrap();
        // root and sam are elevated
        assert_eq!(f.store.count_unread("sam", &Utc::now()).unwrap(), 1);
        assert_eq!(f.store.count_unread("root", &Utc::now()).unwrap(), 2);

        let id = leave.id.to_string();
        assert!(matches!(
            shop.decide_leave(&Actor::user("ana"), &id, true, None),
            Err(WorkflowError::Unauthorized { .. })
        ));

        let decided = shop
            .decide_leave(&Actor::user("sam"), &id, true, Some("Enjoy".into()))
            .unwrap();
        assert_eq!(decided.status, LeaveStatus::Approved);
        assert_eq!(decided.decided_by.as_deref(), Some("sam"));
        assert_eq!(f.store.count_unread("ana", &Utc::now()).unwrap(), 1);

        assert!(matches!(
            shop.decide_leave(&Actor::user("sam"), &id, false, None),
            Err(WorkflowError::AlreadyDecided { .. })
        ));
    }

    #[test]
    fn test_reversed_leave_dates_rejected() {
        let f = fixture();
        let shop = Workshop::new(&f.project, &f.store, &f.roster);
        let emp = shop.hire(&Actor::user("hr"), ana()).unwrap();
        assert!(matches!(
            shop.request_leave(
                &Actor::user("ana"),
                LeaveRequest::new(emp.id.to_string(), date(14), date(10), "ana"),
            ),
            Err(WorkflowError::InvalidDates)
        ));
    }
}
