//! In-memory stores
//!
//! Same semantics as the Postgres stores, held in process memory. Used by tests
//! and for running the service without a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;
use wd_core::SortDirection;
use wd_models::{AuditFilter, AuditLog, PasswordReset, User, UserFilter, UserSession, UserSort, UserStats};

use crate::repository::{RepositoryError, RepositoryResult};
use crate::store::{AuditStore, PasswordResetStore, SessionStore, UserStore};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

fn compare_users(a: &User, b: &User, sort: UserSort) -> Ordering {
    match sort {
        UserSort::Email => a.email.cmp(&b.email),
        UserSort::FirstName => a.first_name.cmp(&b.first_name),
        UserSort::LastName => a.last_name.cmp(&b.last_name),
        UserSort::Role => a.role.as_str().cmp(b.role.as_str()),
        UserSort::LastLogin => a.last_login.cmp(&b.last_login),
        UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write();
        let email = user.email.to_lowercase();
        if users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(RepositoryError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write();
        let email = user.email.to_lowercase();
        if users
            .values()
            .any(|u| u.id != user.id && u.email.to_lowercase() == email)
        {
            return Err(RepositoryError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn search(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: SortDirection,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<(Vec<User>, i64)> {
        let mut matches: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            // NULLS LAST regardless of direction, like the SQL ordering
            if sort == UserSort::LastLogin {
                match (a.last_login.is_none(), b.last_login.is_none()) {
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    _ => {}
                }
            }
            let ord = compare_users(a, b, sort);
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        Ok(self.users.read().values().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn stats(&self, now: DateTime<Utc>) -> RepositoryResult<UserStats> {
        let since = now - Duration::days(30);
        let users = self.users.read();
        let count = |pred: &dyn Fn(&User) -> bool| users.values().filter(|u| pred(u)).count() as i64;

        let mut users_by_role = BTreeMap::new();
        for user in users.values() {
            *users_by_role.entry(user.role.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(UserStats {
            total_users: users.len() as i64,
            active_users: count(&|u| u.is_active),
            verified_users: count(&|u| u.is_verified),
            locked_users: count(&|u| u.is_locked),
            users_by_role,
            recent_registrations: count(&|u| u.created_at >= since),
            recent_logins: count(&|u| u.last_login.is_some_and(|t| t >= since)),
        })
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, UserSession>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &UserSession) -> RepositoryResult<()> {
        let mut sessions = self.sessions.write();
        if sessions
            .values()
            .any(|s| s.refresh_token_hash == session.refresh_token_hash)
        {
            return Err(RepositoryError::Conflict(
                "Session token already registered".to_string(),
            ));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<UserSession>> {
        Ok(self.sessions.read().get(&id).cloned())
    }

    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<UserSession>> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.is_active && s.refresh_token_hash == fingerprint)
            .cloned())
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<()> {
        if let Some(session) = self.sessions.write().get_mut(&id) {
            session.last_used_at = now;
        }
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
        let mut sessions = self.sessions.write();
        if sessions
            .values()
            .any(|s| s.id != id && s.refresh_token_hash == replacement)
        {
            return Err(RepositoryError::Conflict(
                "Session token already registered".to_string(),
            ));
        }
        match sessions
            .get_mut(&id)
            .filter(|s| s.is_active && s.refresh_token_hash == current)
        {
            Some(session) => {
                session.refresh_token_hash = replacement.to_string();
                session.expires_at = expires_at;
                session.last_used_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active(&self, user_id: Uuid) -> RepositoryResult<Vec<UserSession>> {
        let mut sessions: Vec<UserSession> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    async fn deactivate(&self, id: Uuid) -> RepositoryResult<bool> {
        match self.sessions.write().get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_by_fingerprint(&self, user_id: Uuid, fingerprint: &str) -> RepositoryResult<u64> {
        Ok(deactivate_where(&self.sessions, |s| {
            s.user_id == user_id && s.refresh_token_hash == fingerprint
        }))
    }

    async fn deactivate_all(&self, user_id: Uuid) -> RepositoryResult<u64> {
        Ok(deactivate_where(&self.sessions, |s| s.user_id == user_id))
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        Ok(deactivate_where(&self.sessions, |s| s.expires_at < now))
    }
}

fn deactivate_where<F>(sessions: &RwLock<HashMap<Uuid, UserSession>>, pred: F) -> u64
where
    F: Fn(&UserSession) -> bool,
{
    let mut count = 0;
    for session in sessions.write().values_mut() {
        if session.is_active && pred(session) {
            session.is_active = false;
            count += 1;
        }
    }
    count
}

#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditLog>>,
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, entry: &AuditLog) -> RepositoryResult<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter, limit: i64, offset: i64) -> RepositoryResult<(Vec<AuditLog>, i64)> {
        let mut matches: Vec<AuditLog> = self
            .entries
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; newest insert first
        matches.reverse();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryPasswordResetStore {
    resets: RwLock<HashMap<Uuid, PasswordReset>>,
}

#[async_trait]
impl PasswordResetStore for MemoryPasswordResetStore {
    async fn insert(&self, reset: &PasswordReset) -> RepositoryResult<()> {
        let mut resets = self.resets.write();
        if resets.values().any(|r| r.token_hash == reset.token_hash) {
            return Err(RepositoryError::Conflict(
                "Reset token already registered".to_string(),
            ));
        }
        resets.insert(reset.id, reset.clone());
        Ok(())
    }

    async fn find_unused_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<PasswordReset>> {
        Ok(self
            .resets
            .read()
            .values()
            .find(|r| !r.is_used && r.token_hash == fingerprint)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<bool> {
        match self.resets.write().get_mut(&id).filter(|r| !r.is_used) {
            Some(reset) => {
                reset.is_used = true;
                reset.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_core::Role;
    use wd_models::AuditAction;

    fn user(email: &str, role: Role) -> User {
        User::new(email, "hash".into(), "First", "Last", role, Utc::now())
    }

    #[tokio::test]
    async fn test_user_insert_conflict_is_case_insensitive() {
        let store = MemoryUserStore::default();
        store.insert(&user("a@example.com", Role::User)).await.unwrap();
        let err = store
            .insert(&user("A@Example.com", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let found = store.find_by_email("A@EXAMPLE.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_user_update() {
        let store = MemoryUserStore::default();
        let mut u = user("a@example.com", Role::User);
        assert!(matches!(
            store.update(&u).await,
            Err(RepositoryError::NotFound(_))
        ));

        store.insert(&u).await.unwrap();
        u.first_name = "Changed".into();
        store.update(&u).await.unwrap();
        assert_eq!(
            store.find_by_id(u.id).await.unwrap().unwrap().first_name,
            "Changed"
        );
    }

    #[tokio::test]
    async fn test_user_search_sort_and_page() {
        let store = MemoryUserStore::default();
        for (email, role) in [
            ("c@example.com", Role::User),
            ("a@example.com", Role::Admin1),
            ("b@example.com", Role::User),
        ] {
            store.insert(&user(email, role)).await.unwrap();
        }

        let (page, total) = store
            .search(&UserFilter::default(), UserSort::Email, SortDirection::Asc, 2, 0)
            .await
            .unwrap();
        assert_eq!(total, 3);
        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);

        let filter = UserFilter {
            role: Some(Role::User),
            ..Default::default()
        };
        let (page, total) = store
            .search(&filter, UserSort::Email, SortDirection::Desc, 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].email, "c@example.com");
    }

    #[tokio::test]
    async fn test_user_search_treats_wildcards_literally() {
        let store = MemoryUserStore::default();
        store.insert(&user("plain@example.com", Role::User)).await.unwrap();
        store.insert(&user("100%_real@example.com", Role::User)).await.unwrap();

        for (term, expected) in [("%", 1), ("_", 1), ("0%_r", 1), ("p_ain", 0)] {
            let filter = UserFilter {
                search: Some(term.into()),
                ..Default::default()
            };
            assert_eq!(store.count(&filter).await.unwrap(), expected, "term {:?}", term);
        }
    }

    #[tokio::test]
    async fn test_user_stats() {
        let store = MemoryUserStore::default();
        let mut locked = user("locked@example.com", Role::User);
        locked.is_locked = true;
        locked.last_login = Some(Utc::now());
        store.insert(&locked).await.unwrap();
        store.insert(&user("admin@example.com", Role::Admin1)).await.unwrap();

        let stats = store.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.locked_users, 1);
        assert_eq!(stats.recent_logins, 1);
        assert_eq!(stats.recent_registrations, 2);
        assert_eq!(stats.users_by_role.get("admin1"), Some(&1));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = MemorySessionStore::default();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let older = UserSession::new(user_id, "fp-1".into(), now + Duration::days(1), now - Duration::hours(1));
        let newer = UserSession::new(user_id, "fp-2".into(), now + Duration::days(1), now);
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let active = store.list_active(user_id).await.unwrap();
        assert_eq!(active[0].id, newer.id);

        assert!(store.find_active_by_fingerprint("fp-1").await.unwrap().is_some());
        assert_eq!(store.deactivate_by_fingerprint(user_id, "fp-1").await.unwrap(), 1);
        assert!(store.find_active_by_fingerprint("fp-1").await.unwrap().is_none());

        assert!(store.deactivate(newer.id).await.unwrap());
        assert!(!store.deactivate(newer.id).await.unwrap());
        assert!(store.list_active(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_rotate_and_expire() {
        let store = MemorySessionStore::default();
        let now = Utc::now();
        let session = UserSession::new(Uuid::new_v4(), "old".into(), now - Duration::minutes(1), now - Duration::days(1));
        store.insert(&session).await.unwrap();

        assert!(store
            .rotate(session.id, "old", "new", now + Duration::days(7), now)
            .await
            .unwrap());
        assert!(!store
            .rotate(session.id, "old", "newer", now + Duration::days(7), now)
            .await
            .unwrap());
        assert!(store.find_active_by_fingerprint("old").await.unwrap().is_none());
        assert!(store.find_active_by_fingerprint("new").await.unwrap().is_some());

        assert_eq!(store.deactivate_expired(now).await.unwrap(), 0);
        assert_eq!(store.deactivate_expired(now + Duration::days(8)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_audit_list_and_purge() {
        let store = MemoryAuditStore::default();
        let now = Utc::now();
        let actor = Uuid::new_v4();

        store
            .insert(&AuditLog::new(AuditAction::LOGIN_FAILED, now - Duration::days(100)))
            .await
            .unwrap();
        store
            .insert(&AuditLog::new(AuditAction::LOGIN_SUCCESSFUL, now - Duration::minutes(5)).actor(Some(actor)))
            .await
            .unwrap();
        store
            .insert(&AuditLog::new(AuditAction::LOGOUT, now).actor(Some(actor)))
            .await
            .unwrap();

        let (entries, total) = store.list(&AuditFilter::default(), 10, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(entries[0].action, "logout");

        let filter = AuditFilter {
            user_id: Some(actor),
            ..Default::default()
        };
        let (_, total) = store.list(&filter, 10, 0).await.unwrap();
        assert_eq!(total, 2);

        assert_eq!(store.purge_older_than(now - Duration::days(90)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_password_reset_single_use() {
        let store = MemoryPasswordResetStore::default();
        let now = Utc::now();
        let reset = PasswordReset::new(Uuid::new_v4(), "fp".into(), now + Duration::hours(1), now);
        store.insert(&reset).await.unwrap();

        assert!(store.find_unused_by_fingerprint("fp").await.unwrap().is_some());
        assert!(store.mark_used(reset.id, now).await.unwrap());
        assert!(store.find_unused_by_fingerprint("fp").await.unwrap().is_none());
        assert!(!store.mark_used(reset.id, now).await.unwrap());
    }
}
