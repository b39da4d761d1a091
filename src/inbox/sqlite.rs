use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{InboxError, InboxRecord, InboxStore};
use crate::sqlite::encode_time;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS inbox_messages (
        id TEXT NOT NULL,
        module TEXT NOT NULL,
        name TEXT NOT NULL,
        received_at TEXT NOT NULL,
        processed_at TEXT NOT NULL,
        PRIMARY KEY (module, id)
    )
"#;

/// Inbox storage in the `inbox_messages` table.
#[derive(Clone)]
pub struct SqliteInboxStore {
    pool: SqlitePool,
}

impl SqliteInboxStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(pool: SqlitePool) -> Result<Self, InboxError> {
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), InboxError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl InboxStore for SqliteInboxStore {
    async fn contains(&self, module: &str, id: Uuid) -> Result<bool, InboxError> {
        let row = sqlx::query("SELECT 1 FROM inbox_messages WHERE module = ? AND id = ?")
            .bind(module)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &InboxRecord) -> Result<(), InboxError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO inbox_messages (id, module, name, received_at, processed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.module)
        .bind(&record.name)
        .bind(encode_time(&record.received_at))
        .bind(encode_time(&record.processed_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
