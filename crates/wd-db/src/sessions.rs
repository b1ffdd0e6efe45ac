//! Session repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use wd_models::UserSession;

use crate::repository::{RepositoryError, RepositoryResult};
use crate::store::SessionStore;

#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    refresh_token_hash: String,
    device_info: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    is_active: bool,
}

impl From<SessionRow> for UserSession {
    fn from(row: SessionRow) -> Self {
        UserSession {
            id: row.id,
            user_id: row.user_id,
            refresh_token_hash: row.refresh_token_hash,
            device_info: row.device_info,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            is_active: row.is_active,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, device_info, ip_address, \
     user_agent, created_at, expires_at, last_used_at, is_active";

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &UserSession) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (id, user_id, refresh_token_hash, device_info, ip_address,
                                       user_agent, created_at, expires_at, last_used_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_used_at)
        .bind(session.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "Session token already registered"))?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<UserSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM user_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<UserSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM user_sessions WHERE refresh_token_hash = $1 AND is_active",
            SESSION_COLUMNS
        ))
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<()> {
        sqlx::query("UPDATE user_sessions SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn rotate(
        &self,
        id: Uuid,
        current: &str,
        replacement: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $3, expires_at = $4, last_used_at = $5
            WHERE id = $1 AND is_active AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(replacement)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "Session token already registered"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self, user_id: Uuid) -> RepositoryResult<Vec<UserSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM user_sessions WHERE user_id = $1 AND is_active ORDER BY last_used_at DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn deactivate(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE id = $1 AND is_active")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_by_fingerprint(&self, user_id: Uuid, fingerprint: &str) -> RepositoryResult<u64> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1 AND refresh_token_hash = $2 AND is_active",
        )
        .bind(user_id)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate_all(&self, user_id: Uuid) -> RepositoryResult<u64> {
        let result = sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("UPDATE user_sessions SET is_active = FALSE WHERE expires_at < $1 AND is_active")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
