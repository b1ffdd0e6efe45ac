//! Password reset repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use wd_models::PasswordReset;

use crate::repository::{RepositoryError, RepositoryResult};
use crate::store::PasswordResetStore;

#[derive(Debug, Clone, FromRow)]
struct PasswordResetRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    is_used: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl From<PasswordResetRow> for PasswordReset {
    fn from(row: PasswordResetRow) -> Self {
        PasswordReset {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            is_used: row.is_used,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used_at: row.used_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        }
    }
}

pub struct PgPasswordResetStore {
    pool: PgPool,
}

impl PgPasswordResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetStore for PgPasswordResetStore {
    async fn insert(&self, reset: &PasswordReset) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (id, user_id, token_hash, is_used, created_at, expires_at,
                                         used_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reset.id)
        .bind(reset.user_id)
        .bind(&reset.token_hash)
        .bind(reset.is_used)
        .bind(reset.created_at)
        .bind(reset.expires_at)
        .bind(reset.used_at)
        .bind(&reset.ip_address)
        .bind(&reset.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "Reset token already registered"))?;

        Ok(())
    }

    async fn find_unused_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<PasswordReset>> {
        let row = sqlx::query_as::<_, PasswordResetRow>(
            r#"
            SELECT id, user_id, token_hash, is_used, created_at, expires_at, used_at, ip_address, user_agent
            FROM password_resets
            WHERE token_hash = $1 AND NOT is_used
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE password_resets SET is_used = TRUE, used_at = $2 WHERE id = $1 AND NOT is_used",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
