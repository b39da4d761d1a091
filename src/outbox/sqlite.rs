use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{OutboxError, OutboxRecord, OutboxStore};
use crate::sqlite::{decode_time, decode_uuid, encode_time, is_unique_violation};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS outbox_messages (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        sent_at TEXT NULL,
        correlation_id TEXT NOT NULL,
        trace_id TEXT NOT NULL,
        user_id TEXT NULL
    )
"#;

const CREATE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_outbox_messages_unsent
    ON outbox_messages (sent_at, created_at)
"#;

const INSERT: &str = r#"
    INSERT INTO outbox_messages
        (id, name, type, data, created_at, sent_at, correlation_id, trace_id, user_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const COLUMNS: &str =
    "id, name, type, data, created_at, sent_at, correlation_id, trace_id, user_id";

/// Outbox storage in the `outbox_messages` table.
#[derive(Clone)]
pub struct SqliteOutboxStore {
    pool: SqlitePool,
}

impl SqliteOutboxStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Wrap `pool` and create the table if it does not exist yet.
    pub async fn open(pool: SqlitePool) -> Result<Self, OutboxError> {
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), OutboxError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert through the caller's connection, typically inside the same
    /// transaction as the business write that produced the message.
    pub async fn insert_in(
        conn: &mut SqliteConnection,
        record: &OutboxRecord,
    ) -> Result<(), OutboxError> {
        bind_insert(record)
            .execute(&mut *conn)
            .await
            .map_err(|err| map_insert_error(err, record.id))?;
        Ok(())
    }
}

fn bind_insert(record: &OutboxRecord) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(INSERT)
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.message_type)
        .bind(&record.data)
        .bind(encode_time(&record.created_at))
        .bind(record.sent_at.as_ref().map(encode_time))
        .bind(record.correlation_id.to_string())
        .bind(&record.trace_id)
        .bind(&record.user_id)
}

fn map_insert_error(err: sqlx::Error, id: Uuid) -> OutboxError {
    if is_unique_violation(&err) {
        OutboxError::Duplicate(id)
    } else {
        OutboxError::Database(err)
    }
}

fn corrupt(column: &'static str) -> impl Fn(String) -> OutboxError {
    move |reason| OutboxError::Corrupt { column, reason }
}

fn from_row(row: &SqliteRow) -> Result<OutboxRecord, OutboxError> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let sent_at: Option<String> = row.try_get("sent_at")?;
    let correlation_id: String = row.try_get("correlation_id")?;

    Ok(OutboxRecord {
        id: decode_uuid(&id).map_err(corrupt("id"))?,
        name: row.try_get("name")?,
        message_type: row.try_get("type")?,
        data: row.try_get("data")?,
        created_at: decode_time(&created_at).map_err(corrupt("created_at"))?,
        sent_at: sent_at
            .as_deref()
            .map(decode_time)
            .transpose()
            .map_err(corrupt("sent_at"))?,
        correlation_id: decode_uuid(&correlation_id).map_err(corrupt("correlation_id"))?,
        trace_id: row.try_get("trace_id")?,
        user_id: row.try_get("user_id")?,
    })
}

#[async_trait]
impl OutboxStore for SqliteOutboxStore {
    async fn insert(&self, record: &OutboxRecord) -> Result<(), OutboxError> {
        bind_insert(record)
            .execute(&self.pool)
            .await
            .map_err(|err| map_insert_error(err, record.id))?;
        Ok(())
    }

    async fn unsent_from(&self, offset: usize, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM outbox_messages WHERE sent_at IS NULL ORDER BY created_at, rowid LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(from_row).collect()
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, OutboxError> {
        let result = sqlx::query(
            "UPDATE outbox_messages SET sent_at = ? WHERE id = ? AND sent_at IS NULL",
        )
        .bind(encode_time(&sent_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxRecord>, OutboxError> {
        let sql = format!("SELECT {COLUMNS} FROM outbox_messages WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn all(&self) -> Result<Vec<OutboxRecord>, OutboxError> {
        let sql = format!("SELECT {COLUMNS} FROM outbox_messages ORDER BY created_at, rowid");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(from_row).collect()
    }
}
