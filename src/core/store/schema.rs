//! Database schema initialization

use rusqlite::{params, OptionalExtension};

use super::{Store, StoreError, SCHEMA_VERSION};

impl Store {
    /// Initialize database schema
    pub(super) fn init_schema(&self) -> Result<(), StoreError> {
        self.in_transaction(|tx| {
            tx.execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- One row per recipient; seq orders rows created in the same instant
            CREATE TABLE IF NOT EXISTS notifications (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                recipient TEXT NOT NULL,
                kind TEXT NOT NULL,
                priority TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                entity_kind TEXT,
                entity_id TEXT,
                action_url TEXT,
                action_label TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                read_at TEXT,
                created_at TEXT NOT NULL,
                expires_at TEXT,
                created_by TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_recipient
                ON notifications(recipient, is_read, created_at);
            CREATE INDEX IF NOT EXISTS idx_notifications_entity
                ON notifications(entity_kind, entity_id);

            -- Audit trail; no foreign keys so entity deletion never touches history
            CREATE TABLE IF NOT EXISTS activity_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                entity_kind TEXT,
                entity_id TEXT,
                extra_data TEXT NOT NULL DEFAULT '{}',
                origin_address TEXT,
                origin_agent TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_actor ON activity_log(actor, created_at);
            CREATE INDEX IF NOT EXISTS idx_activity_entity
                ON activity_log(entity_kind, entity_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_activity_created ON activity_log(created_at);
            "#,
            )?;

            tx.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })
    }

    /// Recorded schema version, or `None` for a fresh database
    pub(super) fn schema_version(&self) -> Result<Option<i32>, StoreError> {
        self.with_conn(|conn| {
            let has_table: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
                [],
                |row| row.get(0),
            )?;
            if !has_table {
                return Ok(None);
            }

            let version = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(version)
        })
    }
}
