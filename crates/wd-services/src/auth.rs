//! Authentication flow
//!
//! login -> access + refresh token -> per-request validation -> refresh ->
//! logout / revocation. Each login opens a session row keyed by the SHA-256
//! fingerprint of its refresh token. Access tokens name their session, so
//! ending a session invalidates its access tokens too.

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wd_auth::{fingerprint, hash_password, verify_password, PasswordPolicy, TokenKind, TokenService};
use wd_core::config::{AppConfig, LockoutConfig};
use wd_core::{WdError, WdResult};
use wd_db::{PasswordResetStore, SessionStore, Stores, UserStore};
use wd_models::{
    validate_input, AuditAction, AuditLog, AuditResource, LockState, PasswordReset, ResetPassword,
    User, UserSession,
};

use crate::audit::AuditService;
use crate::context::RequestContext;
use crate::notifier::{Notice, NoticeKind, Notifier};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const INVALID_ACCESS_TOKEN: &str = "Invalid or expired token";

/// Tokens issued at login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub session_id: Uuid,
}

/// Result of a refresh. `refresh_token` is set only when tokens rotate.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: UserSession,
    pub is_current: bool,
}

/// The account behind a valid access token
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub session_id: Option<Uuid>,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    password_resets: Arc<dyn PasswordResetStore>,
    audit: AuditService,
    tokens: Arc<TokenService>,
    policy: PasswordPolicy,
    notifier: Arc<dyn Notifier>,
    lockout: LockoutConfig,
    rotate_refresh_tokens: bool,
}

impl AuthService {
    pub fn new(
        stores: &Stores,
        audit: AuditService,
        tokens: Arc<TokenService>,
        policy: PasswordPolicy,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        Self {
            users: Arc::clone(&stores.users),
            sessions: Arc::clone(&stores.sessions),
            password_resets: Arc::clone(&stores.password_resets),
            audit,
            tokens,
            policy,
            notifier,
            lockout: config.lockout.clone(),
            rotate_refresh_tokens: config.auth.rotate_refresh_tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Check credentials and lock state. Failed attempts count toward an
    /// automatic temporary lock.
    pub async fn authenticate(&self, email: &str, password: &str, ctx: &RequestContext) -> WdResult<User> {
        let now = Utc::now();
        let Some(mut user) = self.users.find_by_email(email).await? else {
            tracing::info!(email = %email.trim().to_lowercase(), "Login attempt for unknown account");
            return Err(WdError::unauthorized(INVALID_CREDENTIALS));
        };

        let lock_state = user.lock_state(now);
        match lock_state {
            LockState::TemporarilyLocked { remaining } => {
                return Err(WdError::Locked(format!(
                    "Account is locked. Try again in {} minutes",
                    remaining.num_minutes()
                )));
            }
            LockState::PermanentlyLocked => {
                return Err(WdError::Locked(
                    "Account is permanently locked. Contact administrator".to_string(),
                ));
            }
            LockState::Unlocked | LockState::LockExpired => {}
        }

        if !user.is_active {
            return Err(WdError::unauthorized("Account is deactivated"));
        }

        if !verify_password(password, &user.password_hash)? {
            self.record_failed_login(&mut user, ctx).await?;
            return Err(WdError::unauthorized(INVALID_CREDENTIALS));
        }

        user.failed_login_attempts = 0;
        if lock_state == LockState::LockExpired {
            user.unlock(now);
        }
        user.last_login = Some(now);
        user.updated_at = now;
        self.users.update(&user).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::LOGIN_SUCCESSFUL, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        tracing::info!(user_id = %user.id, "Login successful");
        Ok(user)
    }

    async fn record_failed_login(&self, user: &mut User, ctx: &RequestContext) -> WdResult<()> {
        let now = Utc::now();
        user.failed_login_attempts += 1;
        user.updated_at = now;

        let lock_now = user.failed_login_attempts >= self.lockout.max_login_attempts;
        if lock_now {
            let until = now + Duration::minutes(self.lockout.lockout_duration_minutes);
            user.lock(Some(until), now);
        }
        self.users.update(user).await?;

        if lock_now {
            self.audit
                .record(
                    ctx.stamp(AuditLog::new(AuditAction::ACCOUNT_LOCKED_FAILED_ATTEMPTS, now))
                        .actor(Some(user.id))
                        .resource(AuditResource::USER, user.id)
                        .new_values(json!({
                            "failed_attempts": user.failed_login_attempts,
                            "locked_until": user.locked_until,
                        })),
                )
                .await;
            tracing::warn!(
                user_id = %user.id,
                attempts = user.failed_login_attempts,
                "Account locked after failed logins"
            );
        }

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::LOGIN_FAILED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id)
                    .new_values(json!({ "reason": "invalid_password" })),
            )
            .await;

        Ok(())
    }

    /// Open a session for an authenticated user. `remember_me` doubles the
    /// refresh token lifetime.
    pub async fn create_session(&self, user: &User, remember_me: bool, ctx: &RequestContext) -> WdResult<TokenPair> {
        let now = Utc::now();
        let lifetime = if remember_me {
            self.tokens.refresh_lifetime() * 2
        } else {
            self.tokens.refresh_lifetime()
        };

        let refresh_token = self.tokens.create_refresh_token(user.id, lifetime)?;
        let mut session = UserSession::new(user.id, fingerprint(&refresh_token), now + lifetime, now);
        session.device_info = ctx.user_agent.clone();
        session.ip_address = ctx.ip_address.clone();
        session.user_agent = ctx.user_agent.clone();
        self.sessions.insert(&session).await?;

        let access_token = self.tokens.create_access_token(user, session.id)?;

        tracing::debug!(user_id = %user.id, session_id = %session.id, remember_me, "Session created");
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.tokens.expires_in(),
            session_id: session.id,
        })
    }

    /// `authenticate` followed by `create_session`
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
        ctx: &RequestContext,
    ) -> WdResult<(User, TokenPair)> {
        let user = self.authenticate(email, password, ctx).await?;
        let tokens = self.create_session(&user, remember_me, ctx).await?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str, ctx: &RequestContext) -> WdResult<RefreshedTokens> {
        let now = Utc::now();
        let invalid = || WdError::unauthorized(INVALID_REFRESH_TOKEN);

        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| invalid())?;
        let user_id = claims.user_id().map_err(|_| invalid())?;

        let session = self
            .sessions
            .find_active_by_fingerprint(&fingerprint(refresh_token))
            .await?
            .filter(|s| s.user_id == user_id && s.is_usable(now))
            .ok_or_else(invalid)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_usable(now))
            .ok_or_else(|| WdError::unauthorized("User not found or inactive"))?;

        let rotated = if self.rotate_refresh_tokens {
            let lifetime = session.expires_at - session.created_at;
            let token = self.tokens.create_refresh_token(user.id, lifetime)?;
            let swapped = self
                .sessions
                .rotate(session.id, &session.refresh_token_hash, &fingerprint(&token), now + lifetime, now)
                .await?;
            if !swapped {
                return Err(invalid());
            }
            Some(token)
        } else {
            self.sessions.touch(session.id, now).await?;
            None
        };

        let access_token = self.tokens.create_access_token(&user, session.id)?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::TOKEN_REFRESHED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::SESSION, session.id),
            )
            .await;

        Ok(RefreshedTokens {
            access_token,
            refresh_token: rotated,
            expires_in: self.tokens.expires_in(),
        })
    }

    /// End the session holding `refresh_token`, or every session of the user
    /// when no token is given or `all_devices` is set. Returns the number of
    /// sessions ended.
    pub async fn logout(
        &self,
        user: &User,
        refresh_token: Option<&str>,
        all_devices: bool,
        ctx: &RequestContext,
    ) -> WdResult<u64> {
        let now = Utc::now();
        let (ended, action) = match (all_devices, refresh_token) {
            (true, _) => (
                self.sessions.deactivate_all(user.id).await?,
                AuditAction::LOGOUT_ALL_DEVICES,
            ),
            (false, Some(token)) => (
                self.sessions
                    .deactivate_by_fingerprint(user.id, &fingerprint(token))
                    .await?,
                AuditAction::LOGOUT,
            ),
            (false, None) => (self.sessions.deactivate_all(user.id).await?, AuditAction::LOGOUT),
        };

        self.audit
            .record(
                ctx.stamp(AuditLog::new(action, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id)
                    .new_values(json!({ "sessions_ended": ended })),
            )
            .await;

        tracing::info!(user_id = %user.id, sessions_ended = ended, all_devices, "Logout");
        Ok(ended)
    }

    /// Start a password reset. Unknown and inactive accounts are ignored
    /// without error so callers cannot enumerate accounts. The token is
    /// delivered through the notifier and returned for the caller's use.
    pub async fn request_password_reset(&self, email: &str, ctx: &RequestContext) -> WdResult<Option<String>> {
        let Some(user) = self.users.find_by_email(email).await?.filter(|u| u.is_active) else {
            tracing::info!("Password reset requested for unknown or inactive account");
            return Ok(None);
        };

        let now = Utc::now();
        let token = self.tokens.create_password_reset_token(&user.email)?;
        let mut reset = PasswordReset::new(
            user.id,
            fingerprint(&token),
            now + self.tokens.password_reset_lifetime(),
            now,
        );
        reset.ip_address = ctx.ip_address.clone();
        reset.user_agent = ctx.user_agent.clone();
        self.password_resets.insert(&reset).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::PASSWORD_RESET_REQUESTED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        let notice = Notice {
            kind: NoticeKind::PasswordReset,
            email: user.email.clone(),
            recipient_name: user.full_name(),
            token: token.clone(),
        };
        if let Err(e) = self.notifier.deliver(&notice).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to deliver password reset notice");
        }

        Ok(Some(token))
    }

    /// Set a new password from a reset token. The token is single use and every
    /// session of the account is ended.
    pub async fn reset_password(&self, input: ResetPassword, ctx: &RequestContext) -> WdResult<()> {
        validate_input(&input)?;
        let now = Utc::now();
        let invalid = || WdError::bad_request(INVALID_RESET_TOKEN);

        let claims = self
            .tokens
            .verify(&input.token, TokenKind::PasswordReset)
            .map_err(|_| invalid())?;

        let reset = self
            .password_resets
            .find_unused_by_fingerprint(&fingerprint(&input.token))
            .await?
            .filter(|r| r.is_valid(now))
            .ok_or_else(invalid)?;

        let mut user = self
            .users
            .find_by_id(reset.user_id)
            .await?
            .filter(|u| u.is_active && u.email == claims.sub.to_lowercase())
            .ok_or_else(invalid)?;

        self.policy
            .check(&input.new_password)
            .into_result("new_password")?;

        let password_hash = hash_password(&input.new_password)?;
        if !self.password_resets.mark_used(reset.id, now).await? {
            return Err(invalid());
        }

        user.password_hash = password_hash;
        user.password_changed_at = now;
        user.updated_at = now;
        self.users.update(&user).await?;

        let ended = self.sessions.deactivate_all(user.id).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::PASSWORD_RESET_COMPLETED, now))
                    .actor(Some(user.id))
                    .resource(AuditResource::USER, user.id),
            )
            .await;

        tracing::info!(user_id = %user.id, sessions_ended = ended, "Password reset completed");
        Ok(())
    }

    /// Active sessions, most recently used first
    pub async fn sessions(&self, user_id: Uuid, current: Option<Uuid>) -> WdResult<Vec<SessionView>> {
        let sessions = self.sessions.list_active(user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionView {
                is_current: Some(session.id) == current,
                session,
            })
            .collect())
    }

    pub async fn revoke_session(&self, user: &User, session_id: Uuid, ctx: &RequestContext) -> WdResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .filter(|s| s.user_id == user.id && s.is_active)
            .ok_or_else(|| WdError::not_found("Session", session_id))?;

        self.sessions.deactivate(session.id).await?;

        self.audit
            .record(
                ctx.stamp(AuditLog::new(AuditAction::SESSION_REVOKED, Utc::now()))
                    .actor(Some(user.id))
                    .resource(AuditResource::SESSION, session.id),
            )
            .await;

        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> WdResult<u64> {
        let deactivated = self.sessions.deactivate_expired(Utc::now()).await?;
        if deactivated > 0 {
            tracing::info!(deactivated, "Deactivated expired sessions");
        }
        Ok(deactivated)
    }

    /// Authenticate a request from its access token
    pub async fn resolve_access_token(&self, token: &str) -> WdResult<Principal> {
        let now = Utc::now();
        let invalid = || WdError::unauthorized(INVALID_ACCESS_TOKEN);

        let claims = self
            .tokens
            .verify(token, TokenKind::Access)
            .map_err(|_| invalid())?;
        let user_id = claims.user_id().map_err(|_| invalid())?;

        if let Some(session_id) = claims.session_id {
            let live = self
                .sessions
                .find(session_id)
                .await?
                .is_some_and(|s| s.user_id == user_id && s.is_usable(now));
            if !live {
                return Err(invalid());
            }
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| WdError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(WdError::unauthorized("User account is deactivated"));
        }
        if matches!(
            user.lock_state(now),
            LockState::TemporarilyLocked { .. } | LockState::PermanentlyLocked
        ) {
            return Err(WdError::Locked("User account is locked".to_string()));
        }

        Ok(Principal {
            user,
            session_id: claims.session_id,
        })
    }
}
