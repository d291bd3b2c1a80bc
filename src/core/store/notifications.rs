//! Notification table operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{format_timestamp, optional_timestamp_column, parsed_column, timestamp_column};
use super::{Store, StoreError};
use crate::core::identity::EntityReference;
use crate::core::notify::Notification;

const COLUMNS: &str = "id, recipient, kind, priority, title, body, entity_kind, entity_id, \
     action_url, action_label, is_read, read_at, created_at, expires_at, created_by";

/// Range query over one recipient's notifications
#[derive(Debug, Clone)]
pub struct NotificationQuery<'a> {
    pub recipient: &'a str,
    pub unread_only: bool,
    /// Rows with `expires_at <= now` are excluded
    pub now: DateTime<Utc>,
    pub limit: usize,
    pub offset: usize,
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: parsed_column(row, 0)?,
        recipient: row.get(1)?,
        kind: parsed_column(row, 2)?,
        priority: parsed_column(row, 3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        entity: EntityReference::from_columns(row.get(6)?, row.get(7)?),
        action_url: row.get(8)?,
        action_label: row.get(9)?,
        is_read: row.get::<_, i64>(10)? != 0,
        read_at: optional_timestamp_column(row, 11)?,
        created_at: timestamp_column(row, 12)?,
        expires_at: optional_timestamp_column(row, 13)?,
        created_by: row.get(14)?,
    })
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl Store {
    /// Insert a batch of notifications; either every row lands or none do
    pub fn insert_notifications(&self, rows: &[Notification]) -> Result<(), StoreError> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO notifications ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ))?;

            for n in rows {
                stmt.execute(params![
                    n.id.to_string(),
                    n.recipient,
                    n.kind.to_string(),
                    n.priority.to_string(),
                    n.title,
                    n.body,
                    n.entity.as_ref().map(|r| r.kind.as_str()),
                    n.entity.as_ref().map(|r| r.id.as_str()),
                    n.action_url,
                    n.action_label,
                    n.is_read,
                    n.read_at.as_ref().map(format_timestamp),
                    format_timestamp(&n.created_at),
                    n.expires_at.as_ref().map(format_timestamp),
                    n.created_by,
                ])?;
            }
            Ok(())
        })
    }

    /// Fetch a single notification by id
    pub fn notification(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM notifications WHERE id = ?1"),
                    params![id],
                    notification_from_row,
                )
                .optional()?;
            Ok(found)
        })
    }

    /// Set the read flag on one row; returns false if it was already read or absent
    pub fn mark_notification_read(&self, id: &str, at: &DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1, read_at = ?2 WHERE id = ?1 AND is_read = 0",
                params![id, format_timestamp(at)],
            )?;
            Ok(changed > 0)
        })
    }

    /// Mark every unread, unexpired row for a recipient as read in one transaction
    pub fn mark_all_notifications_read(
        &self,
        recipient: &str,
        at: &DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let changed = tx.execute(
                "UPDATE notifications SET is_read = 1, read_at = ?2
                 WHERE recipient = ?1 AND is_read = 0
                   AND (expires_at IS NULL OR expires_at > ?2)",
                params![recipient, format_timestamp(at)],
            )?;
            Ok(changed)
        })
    }

    /// Delete one row; returns whether it existed
    pub fn delete_notification(&self, id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }

    /// Count unread, unexpired rows for a recipient
    pub fn count_unread(&self, recipient: &str, now: &DateTime<Utc>) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications
                 WHERE recipient = ?1 AND is_read = 0
                   AND (expires_at IS NULL OR expires_at > ?2)",
                params![recipient, format_timestamp(now)],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    /// Newest-first page of a recipient's unexpired notifications
    pub fn list_notifications(
        &self,
        query: &NotificationQuery<'_>,
    ) -> Result<Vec<Notification>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM notifications
                 WHERE recipient = ?1
                   AND (expires_at IS NULL OR expires_at > ?2)
                   {}
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?3 OFFSET ?4",
                if query.unread_only { "AND is_read = 0" } else { "" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        query.recipient,
                        format_timestamp(&query.now),
                        limit_param(query.limit),
                        limit_param(query.offset),
                    ],
                    notification_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete read rows created before the cutoff; unread rows are kept
    pub fn delete_read_notifications_before(
        &self,
        cutoff: &DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let removed = tx.execute(
                "DELETE FROM notifications WHERE is_read = 1 AND created_at < ?1",
                params![format_timestamp(cutoff)],
            )?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::core::notify::{NotificationKind, Priority};
    use chrono::Duration;

    fn row(recipient: &str, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: EntityId::new(EntityPrefix::Ntf),
            recipient: recipient.to_string(),
            kind: NotificationKind::Approval,
            priority: Priority::Urgent,
            title: "Leave request".to_string(),
            body: "Awaiting decision".to_string(),
            entity: Some(EntityReference::new("LeaveRequest", "LVE-1")),
            action_url: Some("/leave/LVE-1".to_string()),
            action_label: Some("Review".to_string()),
            is_read: false,
            read_at: None,
            created_at,
            expires_at: None,
            created_by: Some("sam".to_string()),
        }
    }

    #[test]
    fn test_insert_and_fetch_preserves_fields() {
        let store = Store::open_in_memory().unwrap();
        let original = row("alice", Utc::now());
        store.insert_notifications(std::slice::from_ref(&original)).unwrap();

        let loaded = store.notification(&original.id.to_string()).unwrap().unwrap();
        assert_eq!(loaded.recipient, "alice");
        assert_eq!(loaded.kind, NotificationKind::Approval);
        assert_eq!(loaded.priority, Priority::Urgent);
        assert_eq!(loaded.entity, original.entity);
        assert_eq!(loaded.action_label.as_deref(), Some("Review"));
        assert_eq!(loaded.created_by.as_deref(), Some("sam"));
        assert!(!loaded.is_read);
    }

    #[test]
    fn test_batch_insert_is_atomic() {
        let store = Store::open_in_memory().unwrap();
        let first = row("alice", Utc::now());
        let duplicate = first.clone();

        assert!(store.insert_notifications(&[first.clone(), duplicate]).is_err());
        assert!(store.notification(&first.id.to_string()).unwrap().is_none());
    }

    #[test]
    fn test_mark_read_only_changes_unread() {
        let store = Store::open_in_memory().unwrap();
        let n = row("alice", Utc::now());
        store.insert_notifications(std::slice::from_ref(&n)).unwrap();
        let id = n.id.to_string();

        assert!(store.mark_notification_read(&id, &Utc::now()).unwrap());
        let read_at = store.notification(&id).unwrap().unwrap().read_at;
        assert!(!store.mark_notification_read(&id, &Utc::now()).unwrap());
        assert_eq!(store.notification(&id).unwrap().unwrap().read_at, read_at);
    }

    #[test]
    fn test_list_orders_by_creation_descending() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc::now() - Duration::hours(1);
        let older = row("alice", base);
        let newer = row("alice", base + Duration::minutes(5));
        store.insert_notifications(&[newer.clone(), older.clone()]).unwrap();

        let listed = store
            .list_notifications(&NotificationQuery {
                recipient: "alice",
                unread_only: false,
                now: Utc::now(),
                limit: 10,
                offset: 0,
            })
            .unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[test]
    fn test_cleanup_removes_only_old_read_rows() {
        let store = Store::open_in_memory().unwrap();
        let old = Utc::now() - Duration::days(40);
        let mut old_read = row("alice", old);
        old_read.is_read = true;
        old_read.read_at = Some(old);
        let old_unread = row("alice", old);
        let mut fresh_read = row("alice", Utc::now());
        fresh_read.is_read = true;

        store
            .insert_notifications(&[old_read.clone(), old_unread.clone(), fresh_read.clone()])
            .unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        assert_eq!(store.delete_read_notifications_before(&cutoff).unwrap(), 1);
        assert_eq!(store.delete_read_notifications_before(&cutoff).unwrap(), 0);
        assert!(store.notification(&old_read.id.to_string()).unwrap().is_none());
        assert!(store.notification(&old_unread.id.to_string()).unwrap().is_some());
        assert!(store.notification(&fresh_read.id.to_string()).unwrap().is_some());
    }
}
