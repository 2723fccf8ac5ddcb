//! SQLite-backed store via sqlx.
//!
//! Blocks and their events are written in one transaction, so a crash
//! mid-seal leaves either the complete block or nothing. The schema keeps
//! a unique key on `block_number`; a second genesis insert fails at the
//! database level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::block::AuditBlock;
use crate::ledger::event::{AuditEvent, EventType, Severity};
use crate::storage::PersistenceStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the given database URL, creating the file if needed.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LedgerError::Config(format!("invalid database url: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use `sqlite::memory:` pools).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the schema migration. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(include_str!("../../migrations/001_initial_schema.sql"))
            .execute(&self.pool)
            .await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn event_from_row(row: &SqliteRow) -> Result<AuditEvent, LedgerError> {
        let event_type_str: String = row.try_get("event_type")?;
        let event_type = EventType::parse(&event_type_str).ok_or_else(|| {
            LedgerError::Storage(format!("unknown stored event type '{}'", event_type_str))
        })?;

        let severity_str: String = row.try_get("severity")?;
        let severity = Severity::parse(&severity_str).ok_or_else(|| {
            LedgerError::Storage(format!("unknown stored severity '{}'", severity_str))
        })?;

        let metadata_json: String = row.try_get("metadata")?;
        let metadata = serde_json::from_str(&metadata_json)?;

        Ok(AuditEvent {
            id: row.try_get("id")?,
            event_type,
            service_name: row.try_get("service_name")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            description: row.try_get("description")?,
            severity,
            metadata,
            timestamp: row.try_get("timestamp")?,
            content_hash: row.try_get("content_hash")?,
        })
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn put_event(&self, event: &AuditEvent) -> Result<bool, LedgerError> {
        let metadata_json = serde_json::to_string(&event.metadata)?;
        // The primary key on id makes the duplicate check and the insert a
        // single atomic operation; a replayed id leaves the stored row alone.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (id, event_type, service_name, action, resource_type, description,
                 severity, metadata, timestamp, content_hash, block_number, position)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
            "#,
        )
        .bind(&event.id)
        .bind(event.event_type.as_str())
        .bind(&event.service_name)
        .bind(&event.action)
        .bind(&event.resource_type)
        .bind(&event.description)
        .bind(event.severity.as_str())
        .bind(&metadata_json)
        .bind(event.timestamp)
        .bind(&event.content_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn put_block(&self, block: &AuditBlock) -> Result<(), LedgerError> {
        let mut seen = std::collections::HashSet::new();
        for event in &block.events {
            if !seen.insert(event.id.as_str()) {
                return Err(LedgerError::Storage(format!(
                    "block {} contains duplicate event id {}",
                    block.block_number, event.id
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO blocks (block_number, previous_hash, block_hash, created_at, sealed)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(block.block_number as i64)
        .bind(&block.previous_hash)
        .bind(&block.block_hash)
        .bind(block.created_at)
        .bind(block.sealed)
        .execute(&mut *tx)
        .await?;

        for (position, event) in block.events.iter().enumerate() {
            let metadata_json = serde_json::to_string(&event.metadata)?;
            // The conflict arm only claims pending rows; an event already
            // owned by another block leaves rows_affected at zero, which
            // aborts the transaction instead of rewriting sealed history.
            let result = sqlx::query(
                r#"
                INSERT INTO events
                    (id, event_type, service_name, action, resource_type, description,
                     severity, metadata, timestamp, content_hash, block_number, position)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    block_number = excluded.block_number,
                    position = excluded.position
                WHERE events.block_number IS NULL
                "#,
            )
            .bind(&event.id)
            .bind(event.event_type.as_str())
            .bind(&event.service_name)
            .bind(&event.action)
            .bind(&event.resource_type)
            .bind(&event.description)
            .bind(event.severity.as_str())
            .bind(&metadata_json)
            .bind(event.timestamp)
            .bind(&event.content_hash)
            .bind(block.block_number as i64)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                return Err(LedgerError::Storage(format!(
                    "event {} is already sealed in another block",
                    event.id
                )));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_block(&self, block_number: u64) -> Result<Option<AuditBlock>, LedgerError> {
        let row = sqlx::query(
            "SELECT block_number, previous_hash, block_hash, created_at, sealed FROM blocks WHERE block_number = ?",
        )
        .bind(block_number as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let event_rows = sqlx::query("SELECT * FROM events WHERE block_number = ? ORDER BY position ASC")
            .bind(block_number as i64)
            .fetch_all(&self.pool)
            .await?;

        let events = event_rows
            .iter()
            .map(Self::event_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(AuditBlock {
            block_number: row.try_get::<i64, _>("block_number")? as u64,
            previous_hash: row.try_get("previous_hash")?,
            events,
            block_hash: row.try_get("block_hash")?,
            created_at: row.try_get("created_at")?,
            sealed: row.try_get("sealed")?,
        }))
    }

    async fn get_event(&self, id: &str) -> Result<Option<AuditEvent>, LedgerError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::event_from_row(&r)).transpose()
    }

    async fn load_pending_events(&self) -> Result<Vec<AuditEvent>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM events WHERE block_number IS NULL ORDER BY timestamp ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::event_from_row).collect()
    }

    async fn latest_block_number(&self) -> Result<Option<u64>, LedgerError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(block_number) FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map(|n| n as u64))
    }

    async fn count_blocks(&self) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_events(&self) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE block_number IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_events_since(&self, since: DateTime<Utc>) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events WHERE block_number IS NOT NULL AND timestamp >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}
