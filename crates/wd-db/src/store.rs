//! Store traits
//!
//! Services talk to persistence only through these traits, so the same logic
//! runs over Postgres in production and over the in-memory stores in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use wd_core::SortDirection;
use wd_models::{AuditFilter, AuditLog, PasswordReset, User, UserFilter, UserSession, UserSort, UserStats};

use crate::memory::{MemoryAuditStore, MemoryPasswordResetStore, MemorySessionStore, MemoryUserStore};
use crate::pool::Database;
use crate::repository::RepositoryResult;
use crate::{PgAuditStore, PgPasswordResetStore, PgSessionStore, PgUserStore};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken (case-insensitive)
    async fn insert(&self, user: &User) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Persist every mutable column of `user`. `NotFound` if it does not exist.
    async fn update(&self, user: &User) -> RepositoryResult<()>;

    /// Matching users for one page plus the total match count
    async fn search(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<(Vec<User>, i64)>;

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64>;

    /// Aggregate counts; "recent" means within 30 days of `now`
    async fn stats(&self, now: DateTime<Utc>) -> RepositoryResult<UserStats>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &UserSession) -> RepositoryResult<()>;

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<UserSession>>;

    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<UserSession>>;

    /// Record use of the session
    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<()>;

    /// Swap the refresh token behind a session, provided it is still active
    /// and still holds `current`. Returns whether the swap happened.
    async fn rotate(
        &self,
        id: Uuid,
        current: &str,
        replacement: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    /// Active sessions of a user, most recently used first
    async fn list_active(&self, user_id: Uuid) -> RepositoryResult<Vec<UserSession>>;

    /// Returns whether an active session was deactivated
    async fn deactivate(&self, id: Uuid) -> RepositoryResult<bool>;

    async fn deactivate_by_fingerprint(&self, user_id: Uuid, fingerprint: &str) -> RepositoryResult<u64>;

    async fn deactivate_all(&self, user_id: Uuid) -> RepositoryResult<u64>;

    /// Deactivate active sessions whose expiry has passed
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, entry: &AuditLog) -> RepositoryResult<()>;

    /// Newest first, plus the total match count
    async fn list(&self, filter: &AuditFilter, limit: i64, offset: i64) -> RepositoryResult<(Vec<AuditLog>, i64)>;

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    async fn insert(&self, reset: &PasswordReset) -> RepositoryResult<()>;

    async fn find_unused_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<PasswordReset>>;

    /// Claim an unused reset. Returns false when it was already used.
    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<bool>;
}

/// One handle per store, shared by the services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub password_resets: Arc<dyn PasswordResetStore>,
}

impl Stores {
    pub fn postgres(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            audit: Arc::new(PgAuditStore::new(pool.clone())),
            password_resets: Arc::new(PgPasswordResetStore::new(pool)),
        }
    }

    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryUserStore::default()),
            sessions: Arc::new(MemorySessionStore::default()),
            audit: Arc::new(MemoryAuditStore::default()),
            password_resets: Arc::new(MemoryPasswordResetStore::default()),
        }
    }
}
