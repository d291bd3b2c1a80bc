//! Activity log table operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::types::{format_timestamp, parsed_column, timestamp_column};
use super::{Store, StoreError};
use crate::core::activity::{ActivityLogEntry, Origin};
use crate::core::identity::EntityReference;

const COLUMNS: &str = "id, actor, action, description, entity_kind, entity_id, extra_data, \
     origin_address, origin_agent, created_at";

/// Newest-first query over the activity log
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub actor: Option<String>,
    pub entity: Option<EntityReference>,
    pub limit: usize,
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityLogEntry> {
    let extra: String = row.get(6)?;
    let extra_data = serde_json::from_str(&extra).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ActivityLogEntry {
        id: parsed_column(row, 0)?,
        actor: row.get(1)?,
        action: parsed_column(row, 2)?,
        description: row.get(3)?,
        entity: EntityReference::from_columns(row.get(4)?, row.get(5)?),
        extra_data,
        origin: Origin {
            address: row.get(7)?,
            agent: row.get(8)?,
        },
        created_at: timestamp_column(row, 9)?,
    })
}

impl Store {
    /// Append one entry
    pub fn insert_activity(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        let extra = serde_json::to_string(&entry.extra_data)?;
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO activity_log ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    entry.id.to_string(),
                    entry.actor,
                    entry.action.as_str(),
                    entry.description,
                    entry.entity.as_ref().map(|r| r.kind.as_str()),
                    entry.entity.as_ref().map(|r| r.id.as_str()),
                    extra,
                    entry.origin.address,
                    entry.origin.agent,
                    format_timestamp(&entry.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Entries matching the query, newest first
    pub fn recent_activity(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let mut sql = format!("SELECT {COLUMNS} FROM activity_log WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();

        if let Some(actor) = &query.actor {
            args.push(actor.clone());
            sql.push_str(&format!(" AND actor = ?{}", args.len()));
        }
        if let Some(entity) = &query.entity {
            args.push(entity.kind.clone());
            sql.push_str(&format!(" AND entity_kind = ?{}", args.len()));
            args.push(entity.id.clone());
            sql.push_str(&format!(" AND entity_id = ?{}", args.len()));
        }
        sql.push_str(&format!(
            " ORDER BY created_at DESC, seq DESC LIMIT {}",
            i64::try_from(query.limit).unwrap_or(i64::MAX)
        ));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Bulk-delete entries created before the cutoff
    pub fn delete_activity_before(&self, cutoff: &DateTime<Utc>) -> Result<usize, StoreError> {
        self.in_transaction(|tx| {
            let removed = tx.execute(
                "DELETE FROM activity_log WHERE created_at < ?1",
                params![format_timestamp(cutoff)],
            )?;
            Ok(removed)
        })
    }

    /// Total number of entries
    pub fn activity_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM activity_log", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activity::{ActivityAction, ActivityEvent, ActivityLogger};

    #[test]
    fn test_origin_and_custom_action_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let logger = ActivityLogger::new(&store);
        let written = logger
            .log(
                ActivityEvent::new("kiosk", ActivityAction::custom("clock_in"))
                    .reference(EntityReference::new("Employee", "EMP-1"))
                    .origin(Origin {
                        address: Some("10.0.4.12".into()),
                        agent: Some("floor-kiosk/2".into()),
                    }),
            )
            .unwrap();

        let read = store.recent_activity(&ActivityQuery {
            limit: 1,
            ..ActivityQuery::default()
        })
        .unwrap()
        .remove(0);
        assert_eq!(read, written);
        assert_eq!(read.action, ActivityAction::Custom("CLOCK_IN".into()));
    }

    #[test]
    fn test_query_filters_by_actor_and_entity() {
        let store = Store::open_in_memory().unwrap();
        let logger = ActivityLogger::new(&store);
        let emp = EntityReference::new("Employee", "EMP-1");
        let job = EntityReference::new("JobCard", "JOB-1");

        logger.log(ActivityEvent::new("sam", ActivityAction::View).reference(emp.clone()));
        logger.log(ActivityEvent::new("mia", ActivityAction::View).reference(emp.clone()));
        logger.log(ActivityEvent::new("sam", ActivityAction::View).reference(job));

        let by_entity = store
            .recent_activity(&ActivityQuery {
                entity: Some(emp.clone()),
                limit: 10,
                ..ActivityQuery::default()
            })
            .unwrap();
        assert_eq!(by_entity.len(), 2);

        let both = store
            .recent_activity(&ActivityQuery {
                actor: Some("sam".into()),
                entity: Some(emp),
                limit: 10,
            })
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].actor, "sam");
    }
}
