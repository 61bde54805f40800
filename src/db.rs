//! PostgreSQL-backed session store

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DEFAULT_ENTRY_STATE;
use crate::errors::SessionStoreError;
use crate::session::{SessionStore, UserSession};

/// Open a connection pool for the session database
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .context("Failed to connect to session database")?;
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id BIGINT PRIMARY KEY,
            username TEXT,
            is_premium BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_states (
            user_id BIGINT PRIMARY KEY,
            current_state TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_states table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_data (
            user_id BIGINT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (user_id, key)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_data table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Session store over the `users`, `user_states` and `user_data` tables
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
    entry_state: String,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_entry_state(pool, DEFAULT_ENTRY_STATE)
    }

    pub fn with_entry_state(pool: PgPool, entry_state: impl Into<String>) -> Self {
        Self {
            pool,
            entry_state: entry_state.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_or_create(
        &self,
        chat_id: i64,
        display_name: Option<&str>,
    ) -> Result<UserSession, SessionStoreError> {
        let inserted = sqlx::query(
            "INSERT INTO users (id, username, is_premium) VALUES ($1, $2, FALSE)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(display_name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(user_id = chat_id, "Created new user");
        }

        let row: Option<(Option<String>, bool, DateTime<Utc>)> =
            sqlx::query_as("SELECT username, is_premium, created_at FROM users WHERE id = $1")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;
        let (username, is_premium, created_at) = row.ok_or_else(|| SessionStoreError::Corrupt {
            chat_id,
            reason: "user row missing after upsert".to_string(),
        })?;

        Ok(UserSession {
            chat_id,
            username,
            current_state_id: self.get_state(chat_id).await?,
            attributes: self.get_attributes(chat_id).await?,
            is_premium,
            created_at,
        })
    }

    async fn get_state(&self, chat_id: i64) -> Result<String, SessionStoreError> {
        let state: Option<(String,)> =
            sqlx::query_as("SELECT current_state FROM user_states WHERE user_id = $1")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;

        match state {
            Some((current,)) if current.trim().is_empty() => Err(SessionStoreError::Corrupt {
                chat_id,
                reason: "empty current_state".to_string(),
            }),
            Some((current,)) => Ok(current),
            None => Ok(self.entry_state.clone()),
        }
    }

    async fn set_state(&self, chat_id: i64, state_id: &str) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO user_states (user_id, current_state, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (user_id)
             DO UPDATE SET current_state = EXCLUDED.current_state, updated_at = NOW()",
        )
        .bind(chat_id)
        .bind(state_id)
        .execute(&self.pool)
        .await?;

        debug!(user_id = chat_id, state_id = %state_id, "User state updated");
        Ok(())
    }

    async fn get_attributes(&self, chat_id: i64) -> Result<HashMap<String, String>, SessionStoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM user_data WHERE user_id = $1")
                .bind(chat_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }

    async fn set_attribute(&self, chat_id: i64, key: &str, value: &str) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO user_data (user_id, key, value)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, key)
             DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(chat_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(user_id = chat_id, key = %key, "User attribute stored");
        Ok(())
    }

    async fn is_premium(&self, chat_id: i64) -> Result<bool, SessionStoreError> {
        let premium: Option<(bool,)> = sqlx::query_as("SELECT is_premium FROM users WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(premium.map(|(p,)| p).unwrap_or(false))
    }

    async fn set_premium(&self, chat_id: i64, is_premium: bool) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO users (id, is_premium) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET is_premium = EXCLUDED.is_premium",
        )
        .bind(chat_id)
        .bind(is_premium)
        .execute(&self.pool)
        .await?;

        info!(user_id = chat_id, is_premium, "User entitlement updated");
        Ok(())
    }
}
