use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::AppError;

pub const COACHES: &str = "coaches";
pub const TIME_SLOTS: &str = "timeslots";
pub const ASSIGNMENTS: &str = "assignments";

/// Keyed blob store: one list of records per named collection.
/// No transactions, no indexing, no schema.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, collection: &str) -> Result<Vec<Value>, AppError>;
    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<(), AppError>;
}

pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.db)
                .await?;

        match payload {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<(), AppError> {
        let payload = serde_json::to_string(&records)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO collections (name, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(payload)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, collection: &str, records: Vec<Value>) -> Result<(), AppError> {
        self.collections
            .write()
            .await
            .insert(collection.to_string(), records);
        Ok(())
    }
}
