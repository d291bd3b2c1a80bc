//! Notification dispatch with per-recipient fan-out
//!
//! One logical event produces one independent row per recipient. Read state
//! lives on each row, so recipients never contend over shared state.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::entity::Referable;
use crate::core::identity::{EntityId, EntityPrefix, EntityReference};
use crate::core::store::{retention_cutoff, timestamp_now, NotificationQuery, Store, StoreError};
use crate::core::team::{Actor, TeamRoster};

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Task,
    Approval,
    System,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
            NotificationKind::Task => write!(f, "task"),
            NotificationKind::Approval => write!(f, "approval"),
            NotificationKind::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            "task" => Ok(NotificationKind::Task),
            "approval" => Ok(NotificationKind::Approval),
            "system" => Ok(NotificationKind::System),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

/// Notification priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// One message queued for one recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: EntityId,
    pub recipient: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The content of a notification before it is fanned out
#[derive(Debug, Clone, Default)]
pub struct NotificationDraft {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub entity: Option<EntityReference>,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Tie the notification to an entity
    pub fn about<R: Referable + ?Sized>(mut self, entity: &R) -> Self {
        self.entity = Some(entity.reference());
        self
    }

    pub fn reference(mut self, reference: EntityReference) -> Self {
        self.entity = Some(reference);
        self
    }

    pub fn action(mut self, url: impl Into<String>, label: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_label = Some(label.into());
        self
    }

    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    fn for_recipient(&self, recipient: String, now: DateTime<Utc>) -> Notification {
        Notification {
            id: EntityId::new(EntityPrefix::Ntf),
            recipient,
            kind: self.kind,
            priority: self.priority,
            title: self.title.clone(),
            body: self.body.clone(),
            entity: self.entity.clone(),
            action_url: self.action_url.clone(),
            action_label: self.action_label.clone(),
            is_read: false,
            read_at: None,
            created_at: now,
            expires_at: self.expires_at,
            created_by: self.created_by.clone(),
        }
    }
}

/// Errors from notification operations
#[derive(Debug, Error, Diagnostic)]
pub enum NotifyError {
    #[error("notification not found: {0}")]
    #[diagnostic(code(floor::notify::not_found))]
    NotFound(String),

    #[error("{actor} may not modify notification {id}")]
    #[diagnostic(
        code(floor::notify::denied),
        help("only the recipient or an administrator can change a notification")
    )]
    AuthorizationDenied { actor: String, id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Paging options for [`Dispatcher::list_recent`]
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
    pub unread_only: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            unread_only: false,
        }
    }
}

/// One page of notifications, newest first
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub has_more: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Creates and manages notification rows
pub struct Dispatcher<'s> {
    store: &'s Store,
}

impl<'s> Dispatcher<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Fan a draft out to every recipient, one row each
    ///
    /// All rows are written in a single transaction.
    pub fn dispatch<I>(
        &self,
        recipients: I,
        draft: &NotificationDraft,
    ) -> Result<Vec<Notification>, NotifyError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let now = timestamp_now();
        let rows: Vec<Notification> = recipients
            .into_iter()
            .map(|recipient| draft.for_recipient(recipient.into(), now))
            .collect();

        if rows.is_empty() {
            tracing::debug!(title = %draft.title, "dispatch with no recipients");
            return Ok(rows);
        }

        self.store.insert_notifications(&rows)?;
        tracing::info!(
            count = rows.len(),
            kind = %draft.kind,
            priority = %draft.priority,
            "notifications dispatched"
        );
        Ok(rows)
    }

    /// Notify every active administrator on the roster
    pub fn notify_administrators(
        &self,
        roster: &TeamRoster,
        draft: &NotificationDraft,
    ) -> Result<Vec<Notification>, NotifyError> {
        self.dispatch(roster.administrators(), draft)
    }

    /// Notify every active elevated-privilege account on the roster
    pub fn notify_elevated(
        &self,
        roster: &TeamRoster,
        draft: &NotificationDraft,
    ) -> Result<Vec<Notification>, NotifyError> {
        self.dispatch(roster.elevated(), draft)
    }

    /// Mark one notification read; repeated calls leave it unchanged
    pub fn mark_read(&self, id: &str, actor: &Actor) -> Result<Notification, NotifyError> {
        let current = self.authorized(id, actor)?;
        if current.is_read {
            return Ok(current);
        }

        self.store.mark_notification_read(id, &timestamp_now())?;
        self.store
            .notification(id)?
            .ok_or_else(|| NotifyError::NotFound(id.to_string()))
    }

    /// Mark every unread notification owned by the actor; returns the count changed
    pub fn mark_all_read(&self, actor: &Actor) -> Result<usize, NotifyError> {
        let count = self
            .store
            .mark_all_notifications_read(&actor.name, &timestamp_now())?;
        tracing::debug!(actor = %actor.name, count, "marked all notifications read");
        Ok(count)
    }

    /// Delete one notification
    pub fn delete(&self, id: &str, actor: &Actor) -> Result<(), NotifyError> {
        self.authorized(id, actor)?;
        if !self.store.delete_notification(id)? {
            return Err(NotifyError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Count of unread, unexpired notifications for the actor
    pub fn unread_count(&self, actor: &Actor) -> Result<u64, NotifyError> {
        Ok(self.store.count_unread(&actor.name, &Utc::now())?)
    }

    /// Newest-first page of the actor's unexpired notifications
    pub fn list_recent(
        &self,
        actor: &Actor,
        options: &ListOptions,
    ) -> Result<NotificationPage, NotifyError> {
        let mut items = self.store.list_notifications(&NotificationQuery {
            recipient: &actor.name,
            unread_only: options.unread_only,
            now: Utc::now(),
            // One extra row tells us whether another page exists
            limit: options.limit.saturating_add(1),
            offset: options.offset,
        })?;

        let has_more = items.len() > options.limit;
        items.truncate(options.limit);

        Ok(NotificationPage {
            items,
            has_more,
            limit: options.limit,
            offset: options.offset,
        })
    }

    /// Delete read notifications created more than `older_than_days` ago
    pub fn cleanup(&self, older_than_days: u32) -> Result<usize, NotifyError> {
        let cutoff = retention_cutoff(older_than_days);
        let removed = self.store.delete_read_notifications_before(&cutoff)?;
        tracing::info!(removed, older_than_days, "notification retention cleanup");
        Ok(removed)
    }

    fn authorized(&self, id: &str, actor: &Actor) -> Result<Notification, NotifyError> {
        let notification = self
            .store
            .notification(id)?
            .ok_or_else(|| NotifyError::NotFound(id.to_string()))?;

        if notification.recipient != actor.name && !actor.admin {
            return Err(NotifyError::AuthorizationDenied {
                actor: actor.name.clone(),
                id: id.to_string(),
            });
        }
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::team::{Role, TeamMember};
    use chrono::Duration;
    use std::sync::Arc;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn draft() -> NotificationDraft {
        NotificationDraft::new("Job card released", "JC-1042 is ready for the floor")
    }

    #[test]
    fn test_dispatch_creates_one_row_per_recipient() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);

        let rows = dispatcher
            .dispatch(["alice", "bob", "carol"], &draft())
            .unwrap();
        assert_eq!(rows.len(), 3);

        let ids: std::collections::HashSet<String> =
            rows.iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids.len(), 3);

        for user in ["alice", "bob", "carol"] {
            assert_eq!(dispatcher.unread_count(&Actor::user(user)).unwrap(), 1);
        }
    }

    #[test]
    fn test_dispatch_with_no_recipients_creates_nothing() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let rows = dispatcher.dispatch(Vec::<String>::new(), &draft()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_mark_read_is_per_recipient() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let rows = dispatcher.dispatch(["alice", "bob"], &draft()).unwrap();

        let alice = Actor::user("alice");
        let alice_row = rows.iter().find(|n| n.recipient == "alice").unwrap();
        dispatcher.mark_read(&alice_row.id.to_string(), &alice).unwrap();

        assert_eq!(dispatcher.unread_count(&alice).unwrap(), 0);
        assert_eq!(dispatcher.unread_count(&Actor::user("bob")).unwrap(), 1);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let row = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);
        let id = row.id.to_string();
        let alice = Actor::user("alice");

        let first = dispatcher.mark_read(&id, &alice).unwrap();
        let second = dispatcher.mark_read(&id, &alice).unwrap();

        assert!(first.is_read);
        assert!(first.read_at.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_other_user_is_denied() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let row = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);
        let id = row.id.to_string();

        let bob = Actor::user("bob");
        assert!(matches!(
            dispatcher.mark_read(&id, &bob),
            Err(NotifyError::AuthorizationDenied { .. })
        ));
        assert!(matches!(
            dispatcher.delete(&id, &bob),
            Err(NotifyError::AuthorizationDenied { .. })
        ));
        assert_eq!(dispatcher.unread_count(&Actor::user("alice")).unwrap(), 1);
    }

    #[test]
    fn test_admin_may_delete_any_notification() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let row = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);

        dispatcher
            .delete(&row.id.to_string(), &Actor::admin("root"))
            .unwrap();
        assert_eq!(dispatcher.unread_count(&Actor::user("alice")).unwrap(), 0);
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        assert!(matches!(
            dispatcher.delete("NTF-01HZZZZZZZZZZZZZZZZZZZZZZZ", &Actor::user("alice")),
            Err(NotifyError::NotFound(_))
        ));
    }

    #[test]
    fn test_mark_all_read_counts_only_own_unread() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");

        let rows = dispatcher.dispatch(["alice", "alice", "bob"], &draft()).unwrap();
        dispatcher.mark_read(&rows[0].id.to_string(), &alice).unwrap();
        dispatcher.dispatch(["alice"], &draft()).unwrap();

        assert_eq!(dispatcher.mark_all_read(&alice).unwrap(), 2);
        assert_eq!(dispatcher.mark_all_read(&alice).unwrap(), 0);
        assert_eq!(dispatcher.unread_count(&Actor::user("bob")).unwrap(), 1);
    }

    #[test]
    fn test_mark_all_read_with_concurrent_dispatch() {
        let store = Arc::new(store());
        let alice = Actor::user("alice");
        Dispatcher::new(&store)
            .dispatch(vec!["alice"; 25], &draft())
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let dispatcher = Dispatcher::new(&store);
                for _ in 0..50 {
                    dispatcher.dispatch(["alice"], &draft()).unwrap();
                }
            })
        };

        let marked = Dispatcher::new(&store).mark_all_read(&alice).unwrap();
        writer.join().unwrap();

        let dispatcher = Dispatcher::new(&store);
        let still_unread = dispatcher.unread_count(&alice).unwrap() as usize;
        assert!(marked >= 25);
        assert_eq!(marked + still_unread, 75);
    }

    #[test]
    fn test_unread_count_scenario() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let tech = Actor::user("tech");
        let before = dispatcher.unread_count(&tech).unwrap();

        let job = EntityReference::new("JobCard", "JOB-01J0000000000000000000000A");
        let row = dispatcher
            .dispatch(
                ["tech"],
                &draft()
                    .kind(NotificationKind::Task)
                    .priority(Priority::High)
                    .reference(job.clone()),
            )
            .unwrap()
            .remove(0);
        assert_eq!(row.entity, Some(job));
        assert_eq!(dispatcher.unread_count(&tech).unwrap(), before + 1);

        dispatcher.mark_read(&row.id.to_string(), &tech).unwrap();
        assert_eq!(dispatcher.unread_count(&tech).unwrap(), before);
    }

    #[test]
    fn test_list_recent_is_newest_first_with_paging() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        for i in 0..5 {
            dispatcher
                .dispatch(["alice"], &NotificationDraft::new(format!("n{i}"), "body"))
                .unwrap();
        }

        let page = dispatcher
            .list_recent(
                &alice,
                &ListOptions {
                    limit: 2,
                    offset: 0,
                    unread_only: false,
                },
            )
            .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n4", "n3"]);
        assert!(page.has_more);

        let last = dispatcher
            .list_recent(
                &alice,
                &ListOptions {
                    limit: 2,
                    offset: 4,
                    unread_only: false,
                },
            )
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title, "n0");
        assert!(!last.has_more);
    }

    #[test]
    fn test_list_recent_unread_only() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        let first = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);
        dispatcher.dispatch(["alice"], &draft()).unwrap();
        dispatcher.mark_read(&first.id.to_string(), &alice).unwrap();

        let options = ListOptions {
            unread_only: true,
            ..ListOptions::default()
        };
        let page = dispatcher.list_recent(&alice, &options).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.items[0].is_read);
    }

    #[test]
    fn test_expired_notifications_are_filtered_at_read() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        dispatcher
            .dispatch(
                ["alice"],
                &draft().expires_at(Utc::now() - Duration::minutes(1)),
            )
            .unwrap();
        dispatcher
            .dispatch(["alice"], &draft().expires_at(Utc::now() + Duration::days(1)))
            .unwrap();

        assert_eq!(dispatcher.unread_count(&alice).unwrap(), 1);
        let page = dispatcher.list_recent(&alice, &ListOptions::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.items[0].is_expired(Utc::now()));
    }

    #[test]
    fn test_mark_all_read_skips_expired_rows() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        dispatcher
            .dispatch(["alice"], &draft().expires_at(Utc::now() - Duration::minutes(1)))
            .unwrap();
        dispatcher.dispatch(["alice"], &draft()).unwrap();

        let shown = dispatcher.unread_count(&alice).unwrap();
        assert_eq!(shown, 1);
        assert_eq!(dispatcher.mark_all_read(&alice).unwrap() as u64, shown);
        assert_eq!(dispatcher.unread_count(&alice).unwrap(), 0);
    }

    #[test]
    fn test_wide_fan_out_helpers() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let roster = TeamRoster {
            version: 1,
            members: vec![
                TeamMember {
                    username: "root".into(),
                    name: "Root".into(),
                    email: None,
                    roles: vec![Role::Admin],
                    active: true,
                },
                TeamMember {
                    username: "sam".into(),
                    name: "Sam".into(),
                    email: None,
                    roles: vec![Role::Supervisor],
                    active: true,
                },
            ],
        };

        assert_eq!(dispatcher.notify_administrators(&roster, &draft()).unwrap().len(), 1);
        assert_eq!(dispatcher.notify_elevated(&roster, &draft()).unwrap().len(), 2);
        assert_eq!(dispatcher.unread_count(&Actor::user("root")).unwrap(), 2);
        assert_eq!(dispatcher.unread_count(&Actor::user("sam")).unwrap(), 1);
    }

    #[test]
    fn test_cleanup_twice_removes_nothing_second_time() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        let row = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);
        dispatcher.mark_read(&row.id.to_string(), &alice).unwrap();

        // A zero-day horizon covers everything created before now
        assert_eq!(dispatcher.cleanup(0).unwrap(), 1);
        assert_eq!(dispatcher.cleanup(0).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_with_huge_horizon_removes_nothing() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        let alice = Actor::user("alice");
        let row = dispatcher.dispatch(["alice"], &draft()).unwrap().remove(0);
        dispatcher.mark_read(&row.id.to_string(), &alice).unwrap();

        assert_eq!(dispatcher.cleanup(u32::MAX).unwrap(), 0);
        assert_eq!(dispatcher.cleanup(0).unwrap(), 1);
    }

    #[test]
    fn test_cleanup_keeps_unread() {
        let store = store();
        let dispatcher = Dispatcher::new(&store);
        dispatcher.dispatch(["alice"], &draft()).unwrap();
        assert_eq!(dispatcher.cleanup(0).unwrap(), 0);
        assert_eq!(dispatcher.unread_count(&Actor::user("alice")).unwrap(), 1);
    }

    #[test]
    fn test_kind_and_priority_parse() {
        assert_eq!("Approval".parse::<NotificationKind>().unwrap(), NotificationKind::Approval);
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("loud".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
