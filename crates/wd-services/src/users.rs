//! User management
//!
//! Account lifecycle operations: creation, updates, password changes, soft
//! deletion, locking, search and statistics. Authorization is decided by the
//! caller; these operations only enforce data rules.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wd_auth::{hash_password, verify_password, PasswordPolicy, TokenKind, TokenService};
use wd_core::{Page, PageParams, Role, SortDirection, WdError, WdResult};
use wd_db::{SessionStore, Stores, UserStore};
use wd_models::{
    validate_input, AdminStats, AuditAction, AuditFilter, AuditLog, AuditResource, ChangePassword,
    CreateUser, UpdateProfile, UpdateUser, User, UserFilter, UserSort, UserStats,
};

use crate::audit::AuditService;
use crate::context::RequestContext;
use crate::notifier::{Notice, NoticeKind, Notifier};

/// Upper bound on the administrator listing
const ADMIN_LIST_LIMIT: i64 = 1000;

/// Outcome of [`UserService::ensure_superuser`]
#[derive(Debug, Clone)]
pub enum SuperuserOutcome {
    Created(User),
    AlreadyExists(User),
}

pub struct UserService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    audit: AuditService,
    tokens: Arc<TokenService>,
    policy: PasswordPolicy,
    notifier: Arc<dyn Notifier>,
}

fn user_values(user: &User) -> serde_json::Value {
    json!({
        "first_name": user.first_name,
        "last_name": user.last_name,
        "role": user.role,
        "is_active": user.is_active,
    })
}

fn profile_values(user: &User) -> serde_json::Value {
    json!({
        "first_name": user.first_name,
        "last_name": user.last_name,
        "avatar_url": user.avatar_url,
    })
}

impl UserService {
    pub fn new(
        stores: &Stores,
        audit: AuditService,
        tokens: Arc<TokenService>,
        policy: PasswordPolicy,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            users: Arc::clone(&stores.users),
            sessions: Arc::clone(&stores.sessions),
            audit,
            tokens,
            policy,
            notifier,
        }
    }

    pub async fn create_user(
        &self,
        input: CreateUser,
        created_by: Option<&User>,
        ctx: &RequestContext,
    ) -> WdResult<User> {
        let input = input.normalized();
        validate_input(&input)?;

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(WdError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        self.policy.check(&input.password).into_result("password")?;
        let password_hash = hash_password(&input.password)?;

        let now = Utc::now();
        let mut user = User::new(
            &input.email,
            password_hash,
            &input.first_name,
            &input.last_name,
            input.role,
            now,
        );
        user.is_active = input.is_active;
        self.users.insert(&user).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::USER_CREATED, now))
                    .actor(created_by.map(|u| u.id))
                    .resource(AuditResource::USER, user.id)
                    .new_values(json!({
                        "email": user.email,
                        "first_name": user.first_name,
                        "last_name": user.last_name,
                        "role": user.role,
                    })),
            )
            .await;

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            created_by = ?created_by.map(|u| u.id),
            "User created"
        );

        self.send_verification(&user).await;
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> WdResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| WdError::not_found("User", id))
    }

    pub async fn get_user_by_email(&self, email: &str) -> WdResult<Option<User>> {
        Ok(self.users.find_by_email(email).await?)
    }

    /// Administrative update. Deactivating an account also ends its sessions.
    pub async fn update_user(
        &self,
        id: Uuid,
        patch: UpdateUser,
        updated_by: Option<&User>,
        ctx: &RequestContext,
    ) -> WdResult<User> {
        let patch = patch.normalized();
        validate_input(&patch)?;
        let mut user = self.get_user(id).await?;
        let old_values = user_values(&user);
        let was_active = user.is_active;

        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = Some(avatar_url).filter(|url| !url.trim().is_empty());
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }

        let now = Utc::now();
        user.updated_at = now;
        self.users.update(&user).await?;

        if was_active && !user.is_active {
            self.sessions.deactivate_all(user.id).await?;
        }

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::USER_UPDATED, now))
                    .actor(updated_by.map(|u| u.id))
                    .resource(AuditResource::USER, user.id)
                    .old_values(old_values)
                    .new_values(user_values(&user)),
            )
            .await;

        tracing::info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// Self-service update of name and avatar
    pub async fn update_profile(
        &self,
        id: Uuid,
        patch: UpdateProfile,
        ctx: &RequestContext,
    ) -> WdResult<User> {
        let patch = patch.normalized();
        validate_input(&patch)?;
        let mut user = self.get_user(id).await?;
        let old_values = profile_values(&user);

        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = Some(avatar_url).filter(|url| !url.trim().is_empty());
        }

        let now = Utc::now();
        user.updated_at = now;
        self.users.update(&user).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::PROFILE_UPDATED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id)
                    .old_values(old_values)
                    .new_values(profile_values(&user)),
            )
            .await;

        Ok(user)
    }

    /// Change a password after checking the current one. Every session of the
    /// account is ended.
    pub async fn change_password(
        &self,
        id: Uuid,
        input: ChangePassword,
        ctx: &RequestContext,
    ) -> WdResult<()> {
        validate_input(&input)?;
        let mut user = self.get_user(id).await?;

        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(WdError::bad_request("Current password is incorrect"));
        }

        self.policy
            .check(&input.new_password)
            .into_result("new_password")?;

        let now = Utc::now();
        user.password_hash = hash_password(&input.new_password)?;
        user.password_changed_at = now;
        user.updated_at = now;
        self.users.update(&user).await?;

        let ended = self.sessions.deactivate_all(user.id).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::PASSWORD_CHANGED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        tracing::info!(user_id = %user.id, sessions_ended = ended, "Password changed");
        Ok(())
    }

    /// Soft delete: the account is deactivated and its sessions ended
    pub async fn delete_user(
        &self,
        id: Uuid,
        deleted_by: Option<&User>,
        ctx: &RequestContext,
    ) -> WdResult<()> {
        let mut user = self.get_user(id).await?;
        let now = Utc::now();
        user.is_active = false;
        user.updated_at = now;
        self.users.update(&user).await?;
        self.sessions.deactivate_all(user.id).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::USER_DELETED, now))
                    .actor(deleted_by.map(|u| u.id))
                    .resource(AuditResource::USER, user.id)
                    .old_values(json!({ "email": user.email, "role": user.role })),
            )
            .await;

        tracing::info!(user_id = %user.id, "User deactivated");
        Ok(())
    }

    /// Lock indefinitely until an administrator unlocks
    pub async fn lock_user(
        &self,
        id: Uuid,
        locked_by: Option<&User>,
        ctx: &RequestContext,
    ) -> WdResult<()> {
        let mut user = self.get_user(id).await?;
        let now = Utc::now();
        user.lock(None, now);
        self.users.update(&user).await?;
        self.sessions.deactivate_all(user.id).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::USER_LOCKED, now))
                    .actor(locked_by.map(|u| u.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        tracing::info!(user_id = %user.id, "User locked");
        Ok(())
    }

    pub async fn unlock_user(
        &self,
        id: Uuid,
        unlocked_by: Option<&User>,
        ctx: &RequestContext,
    ) -> WdResult<()> {
        let mut user = self.get_user(id).await?;
        let now = Utc::now();
        user.unlock(now);
        self.users.update(&user).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::USER_UNLOCKED, now))
                    .actor(unlocked_by.map(|u| u.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        tracing::info!(user_id = %user.id, "User unlocked");
        Ok(())
    }

    pub async fn search_users(&self, filter: &UserFilter, params: &PageParams) -> WdResult<Page<User>> {
        let sort = UserSort::parse(&params.sort_by);
        let (items, total) = self
            .users
            .search(filter, sort, params.sort_order, params.limit(), params.offset())
            .await?;
        Ok(Page::new(items, total, params))
    }

    /// Every admin-tier account, oldest first
    pub async fn list_admins(&self) -> WdResult<Vec<User>> {
        let filter = UserFilter {
            roles: Some(Role::ADMIN_TIERS.to_vec()),
            ..Default::default()
        };
        let (admins, _) = self
            .users
            .search(&filter, UserSort::CreatedAt, SortDirection::Asc, ADMIN_LIST_LIMIT, 0)
            .await?;
        Ok(admins)
    }

    pub async fn stats(&self) -> WdResult<UserStats> {
        Ok(self.users.stats(Utc::now()).await?)
    }

    pub async fn admin_stats(&self) -> WdResult<AdminStats> {
        Ok(AdminStats {
            admin1_count: self.count_role(Role::Admin1, None).await?,
            admin2_count: self.count_role(Role::Admin2, None).await?,
            admin3_count: self.count_role(Role::Admin3, None).await?,
            active_admin1: self.count_role(Role::Admin1, Some(true)).await?,
            active_admin2: self.count_role(Role::Admin2, Some(true)).await?,
            active_admin3: self.count_role(Role::Admin3, Some(true)).await?,
        })
    }

    async fn count_role(&self, role: Role, is_active: Option<bool>) -> WdResult<i64> {
        let filter = UserFilter {
            role: Some(role),
            is_active,
            ..Default::default()
        };
        Ok(self.users.count(&filter).await?)
    }

    pub async fn audit_logs(&self, filter: &AuditFilter, params: &PageParams) -> WdResult<Page<AuditLog>> {
        self.audit.list(filter, params).await
    }

    /// Confirm an email address from a verification token
    pub async fn verify_email(&self, token: &str, ctx: &RequestContext) -> WdResult<User> {
        let invalid = || WdError::bad_request("Invalid or expired verification token");

        let claims = self
            .tokens
            .verify(token, TokenKind::EmailVerification)
            .map_err(|_| invalid())?;
        let mut user = self
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(invalid)?;

        if user.is_verified {
            return Ok(user);
        }

        let now = Utc::now();
        user.is_verified = true;
        user.email_verified_at = Some(now);
        user.updated_at = now;
        self.users.update(&user).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::EMAIL_VERIFIED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        Ok(user)
    }

    /// Create the first superuser unless an account with that email exists
    pub async fn ensure_superuser(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> WdResult<SuperuserOutcome> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Ok(SuperuserOutcome::AlreadyExists(existing));
        }

        self.policy.check(password).into_result("password")?;

        let now = Utc::now();
        let mut user = User::new(
            email,
            hash_password(password)?,
            first_name,
            last_name,
            Role::Superadmin,
            now,
        );
        user.is_verified = true;
        user.email_verified_at = Some(now);
        self.users.insert(&user).await?;

        self.audit
            .record(
                AuditLog::new(AuditAction::USER_CREATED, now)
                    .resource(AuditResource::USER, user.id)
                    .new_values(json!({
                        "email": user.email,
                        "first_name": user.first_name,
                        "last_name": user.last_name,
                        "role": user.role,
                    })),
            )
            .await;

        tracing::info!(user_id = %user.id, email = %user.email, "Superuser created");
        Ok(SuperuserOutcome::Created(user))
    }

    async fn send_verification(&self, user: &User) {
        let token = match self.tokens.create_email_verification_token(&user.email) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to issue verification token");
                return;
            }
        };
        let notice = Notice {
            kind: NoticeKind::EmailVerification,
            email: user.email.clone(),
            recipient_name: user.full_name(),
            token,
        };
        if let Err(e) = self.notifier.deliver(&notice).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to deliver verification notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_input, fixture, Fixture, STRONG_PASSWORD};
    use wd_models::LockState;

    #[tokio::test]
    async fn test_create_user() {
        let Fixture { services, notifier, .. } = fixture();
        let ctx = RequestContext::new(Some("127.0.0.1".into()), None);

        let user = services
            .users
            .create_user(create_input("  New.User@Example.com"), None, &ctx)
            .await
            .unwrap();

        assert_eq!(user.email, "new.user@example.com");
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_ne!(user.password_hash, STRONG_PASSWORD);

        let logs = services
            .audit
            .list(&AuditFilter::default(), &PageParams::default())
            .await
            .unwrap();
        assert_eq!(logs.total, 1);
        assert_eq!(logs.items[0].action, AuditAction::USER_CREATED);
        assert_eq!(logs.items[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(logs.items[0].new_values.as_ref().unwrap()["email"], "new.user@example.com");

        assert!(notifier
            .last_token(NoticeKind::EmailVerification, "new.user@example.com")
            .is_some());
    }

    #[tokio::test]
    async fn test_create_duplicate_email_conflicts() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        services.users.create_user(create_input("dup@example.com"), None, &ctx).await.unwrap();

        let err = services
            .users
            .create_user(create_input("DUP@example.com"), None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.public_message(), "User with this email already exists");
    }

    #[tokio::test]
    async fn test_create_rejects_weak_password() {
        let Fixture { services, .. } = fixture();
        let mut input = create_input("weak@example.com");
        input.password = "alllowercase".into();
        input.confirm_password = "alllowercase".into();

        match services.users.create_user(input, None, &RequestContext::system()).await {
            Err(WdError::Validation(errors)) => {
                let messages = errors.get("password").unwrap();
                assert!(messages.contains(&"Password must contain at least one uppercase letter".to_string()));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_user_records_old_and_new_values() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        let admin = services.users.create_user(create_input("admin@example.com"), None, &ctx).await.unwrap();
        let user = services.users.create_user(create_input("target@example.com"), None, &ctx).await.unwrap();

        let patch = UpdateUser {
            first_name: Some(" Renamed ".into()),
            role: Some(Role::Admin2),
            ..Default::default()
        };
        let updated = services.users.update_user(user.id, patch, Some(&admin), &ctx).await.unwrap();
        assert_eq!(updated.first_name, "Renamed");
        assert_eq!(updated.role, Role::Admin2);

        let filter = AuditFilter {
            action: Some(AuditAction::USER_UPDATED.into()),
            ..Default::default()
        };
        let logs = services.audit.list(&filter, &PageParams::default()).await.unwrap();
        let entry = &logs.items[0];
        assert_eq!(entry.user_id, Some(admin.id));
        assert_eq!(entry.old_values.as_ref().unwrap()["role"], "user");
        assert_eq!(entry.new_values.as_ref().unwrap()["role"], "admin2");
        assert_eq!(entry.new_values.as_ref().unwrap()["first_name"], "Renamed");
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let Fixture { services, .. } = fixture();
        let err = services
            .users
            .update_user(Uuid::new_v4(), UpdateUser::default(), None, &RequestContext::system())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.public_message(), "User not found");
    }

    #[tokio::test]
    async fn test_update_profile() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        let user = services.users.create_user(create_input("me@example.com"), None, &ctx).await.unwrap();

        let patch = UpdateProfile {
            avatar_url: Some("https://cdn.example.com/me.png".into()),
            ..Default::default()
        };
        let updated = services.users.update_profile(user.id, patch, &ctx).await.unwrap();
        assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn.example.com/me.png"));
        assert_eq!(updated.first_name, user.first_name);
    }

    #[tokio::test]
    async fn test_change_password_ends_sessions() {
        let Fixture { services, stores, .. } = fixture();
        let ctx = RequestContext::system();
        let user = services.users.create_user(create_input("pw@example.com"), None, &ctx).await.unwrap();
        services.auth.create_session(&user, false, &ctx).await.unwrap();

        let wrong = ChangePassword {
            current_password: "Wr0ng!Password".into(),
            new_password: "N3w!Password".into(),
            confirm_password: "N3w!Password".into(),
        };
        let err = services.users.change_password(user.id, wrong, &ctx).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Current password is incorrect");

        let input = ChangePassword {
            current_password: STRONG_PASSWORD.into(),
            new_password: "N3w!Password".into(),
            confirm_password: "N3w!Password".into(),
        };
        services.users.change_password(user.id, input, &ctx).await.unwrap();

        assert!(stores.sessions.list_active(user.id).await.unwrap().is_empty());
        let reloaded = services.users.get_user(user.id).await.unwrap();
        assert!(verify_password("N3w!Password", &reloaded.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        let user = services.users.create_user(create_input("gone@example.com"), None, &ctx).await.unwrap();

        services.users.delete_user(user.id, None, &ctx).await.unwrap();
        let reloaded = services.users.get_user(user.id).await.unwrap();
        assert!(!reloaded.is_active);
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        let user = services.users.create_user(create_input("lock@example.com"), None, &ctx).await.unwrap();

        services.users.lock_user(user.id, None, &ctx).await.unwrap();
        let locked = services.users.get_user(user.id).await.unwrap();
        assert_eq!(locked.lock_state(Utc::now()), LockState::PermanentlyLocked);

        services.users.unlock_user(user.id, None, &ctx).await.unwrap();
        let unlocked = services.users.get_user(user.id).await.unwrap();
        assert_eq!(unlocked.lock_state(Utc::now()), LockState::Unlocked);
        assert_eq!(unlocked.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn test_search_and_admin_listing() {
        let Fixture { services, .. } = fixture();
        let ctx = RequestContext::system();
        for (email, role) in [
            ("a1@example.com", Role::Admin1),
            ("a3@example.com", Role::Admin3),
            ("u1@example.com", Role::User),
            ("u2@example.com", Role::User),
        ] {
            let mut input = create_input(email);
            input.role = role;
            services.users.create_user(input, None, &ctx).await.unwrap();
        }

        let filter = UserFilter {
            role: Some(Role::User),
            ..Default::default()
        };
        let page = services.users.search_users(&filter, &PageParams::new(1, 1)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pages, 2);
        assert!(page.has_next);

        let admins = services.users.list_admins().await.unwrap();
        let emails: Vec<_> = admins.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a1@example.com", "a3@example.com"]);

        let stats = services.users.admin_stats().await.unwrap();
        assert_eq!(stats.admin1_count, 1);
        assert_eq!(stats.admin2_count, 0);
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.total_active(), 2);

        let stats = services.users.stats().await.unwrap();
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.users_by_role.get("user"), Some(&2));
    }

    #[tokio::test]
    async fn test_verify_email() {
        let Fixture { services, notifier, .. } = fixture();
        let ctx = RequestContext::system();
        let user = services.users.create_user(create_input("verify@example.com"), None, &ctx).await.unwrap();
        let token = notifier
            .last_token(NoticeKind::EmailVerification, "verify@example.com")
            .unwrap();

        let verified = services.users.verify_email(&token, &ctx).await.unwrap();
        assert_eq!(verified.id, user.id);
        assert!(verified.is_verified);
        assert!(verified.email_verified_at.is_some());

        let err = services.users.verify_email("garbage", &ctx).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_ensure_superuser_is_idempotent() {
        let Fixture { services, .. } = fixture();
        let first = services
            .users
            .ensure_superuser("root@example.com", STRONG_PASSWORD, "Super", "Admin")
            .await
            .unwrap();
        let SuperuserOutcome::Created(root) = first else {
            panic!("expected a new superuser");
        };
        assert_eq!(root.role, Role::Superadmin);
        assert!(root.is_verified);

        let second = services
            .users
            .ensure_superuser("ROOT@example.com", STRONG_PASSWORD, "Super", "Admin")
            .await
            .unwrap();
        assert!(matches!(second, SuperuserOutcome::AlreadyExists(u) if u.id == root.id));
    }
}
