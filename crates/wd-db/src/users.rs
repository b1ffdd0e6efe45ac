//! User repository
//!
//! Database operations for users.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;
use wd_core::{Role, SortDirection};
use wd_models::{User, UserFilter, UserSort, UserStats};

use crate::repository::{RepositoryError, RepositoryResult};
use crate::store::UserStore;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, avatar_url, role, \
     is_active, is_verified, is_locked, created_at, updated_at, last_login, password_changed_at, \
     failed_login_attempts, locked_until, email_verified_at";

/// User database entity
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: DateTime<Utc>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| RepositoryError::InvalidData(format!("user {}: {}", row.id, e)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            role,
            is_active: row.is_active,
            is_verified: row.is_verified,
            is_locked: row.is_locked,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
            password_changed_at: row.password_changed_at,
            failed_login_attempts: row.failed_login_attempts,
            locked_until: row.locked_until,
            email_verified_at: row.email_verified_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> RepositoryResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// `%term%` with LIKE wildcards in `term` matched literally
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append `WHERE` clauses for `filter`
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE TRUE");

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = contains_pattern(term);
        qb.push(" AND (email ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR (first_name || ' ' || last_name) ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(roles) = &filter.roles {
        let names: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        qb.push(" AND role = ANY(").push_bind(names).push(")");
    }
    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(verified) = filter.is_verified {
        qb.push(" AND is_verified = ").push_bind(verified);
    }
    if let Some(locked) = filter.is_locked {
        qb.push(" AND is_locked = ").push_bind(locked);
    }
}

fn search_query<'a>(
    filter: &UserFilter,
    sort: UserSort,
    direction: SortDirection,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
    push_filters(&mut qb, filter);
    qb.push(format!(
        " ORDER BY {} {} NULLS LAST, id ASC",
        sort.column(),
        direction.as_sql()
    ));
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);
    qb
}

fn count_query<'a>(filter: &UserFilter) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filters(&mut qb, filter);
    qb
}

#[derive(FromRow)]
struct StatsRow {
    total_users: i64,
    active_users: i64,
    verified_users: i64,
    locked_users: i64,
    recent_registrations: i64,
    recent_logins: i64,
}

/// User repository implementation
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, avatar_url, role,
                               is_active, is_verified, is_locked, created_at, updated_at, last_login,
                               password_changed_at, failed_login_attempts, locked_until, email_verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.is_locked)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login)
        .bind(user.password_changed_at)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.email_verified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "User with this email already exists"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5, avatar_url = $6,
                role = $7, is_active = $8, is_verified = $9, is_locked = $10, last_login = $11,
                password_changed_at = $12, failed_login_attempts = $13, locked_until = $14,
                email_verified_at = $15
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.is_locked)
        .bind(user.last_login)
        .bind(user.password_changed_at)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.email_verified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "User with this email already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn search(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<(Vec<User>, i64)> {
        let rows = search_query(filter, sort, direction, limit, offset)
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?;

        let total = self.count(filter).await?;
        Ok((into_users(rows)?, total))
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        let total = count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn stats(&self, now: DateTime<Utc>) -> RepositoryResult<UserStats> {
        let since = now - Duration::days(30);
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT COUNT(*)                                     AS total_users,
                   COUNT(*) FILTER (WHERE is_active)            AS active_users,
                   COUNT(*) FILTER (WHERE is_verified)          AS verified_users,
                   COUNT(*) FILTER (WHERE is_locked)            AS locked_users,
                   COUNT(*) FILTER (WHERE created_at >= $1)     AS recent_registrations,
                   COUNT(*) FILTER (WHERE last_login >= $1)     AS recent_logins
            FROM users
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let by_role = sqlx::query_as::<_, (String, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(UserStats {
            total_users: row.total_users,
            active_users: row.active_users,
            verified_users: row.verified_users,
            locked_users: row.locked_users,
            users_by_role: by_role.into_iter().collect::<BTreeMap<_, _>>(),
            recent_registrations: row.recent_registrations,
            recent_logins: row.recent_logins,
        })
    }
}
