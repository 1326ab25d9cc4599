//! SQLite-backed subscriber registry.

use async_trait::async_trait;
use poolwatch_core::{SubscriberConfig, SubscriberId};
use poolwatch_engine::{RegistryError, SubscriberRegistry};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Subscriber registry persisted in SQLite.
///
/// The whole config is one JSON column; `set` replaces it, matching the
/// registry contract of whole-config writes.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Connect to SQLite at the given URL, creating the file and schema if
    /// missing.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.run_migrations().await?;
        Ok(registry)
    }

    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn storage(err: sqlx::Error) -> RegistryError {
    RegistryError::Storage(err.to_string())
}

#[async_trait]
impl SubscriberRegistry for SqliteRegistry {
    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig, RegistryError> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT config FROM subscribers WHERE chat_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let json = row.ok_or(RegistryError::NotFound(id))?;
        let config: SubscriberConfig =
            serde_json::from_str(&json).map_err(|e| RegistryError::Invalid {
                id,
                reason: e.to_string(),
            })?;
        config.validate().map_err(|e| RegistryError::Invalid {
            id,
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    async fn set(&self, id: SubscriberId, config: SubscriberConfig) -> Result<(), RegistryError> {
        let json = serde_json::to_string(&config)
            .map_err(|e| RegistryError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO subscribers (chat_id, config)
            VALUES (?, ?)
            ON CONFLICT(chat_id)
            DO UPDATE SET config = excluded.config, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(id.0)
        .bind(&json)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubscriberId>, RegistryError> {
        let rows = sqlx::query_scalar::<_, i64>("SELECT chat_id FROM subscribers")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(rows.into_iter().map(SubscriberId).collect())
    }

    async fn remove(&self, id: SubscriberId) -> Result<(), RegistryError> {
        sqlx::query("DELETE FROM subscribers WHERE chat_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
