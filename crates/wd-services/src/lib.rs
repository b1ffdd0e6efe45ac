//! # wd-services
//!
//! Business logic for Warden.
//!
//! Services sit between the HTTP layer and the stores. They enforce data
//! rules, hash passwords, issue tokens and write the audit trail:
//!
//! - [`UserService`]: account lifecycle, search and statistics
//! - [`AuthService`]: login, sessions, refresh, logout and password reset
//! - [`AuditService`]: audit recording and retention

pub mod audit;
pub mod auth;
pub mod context;
pub mod notifier;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::AuditService;
pub use auth::{AuthService, Principal, RefreshedTokens, SessionView, TokenPair};
pub use context::RequestContext;
pub use notifier::{LogNotifier, MemoryNotifier, Notice, NoticeKind, Notifier};
pub use users::{SuperuserOutcome, UserService};

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use wd_auth::{PasswordPolicy, TokenService};
use wd_core::config::AppConfig;
use wd_core::{WdError, WdResult};
use wd_db::Stores;

/// Outcome of one maintenance sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sessions_deactivated: u64,
    pub audit_entries_purged: u64,
}

/// Every service wired to one set of stores
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub tokens: Arc<TokenService>,
    pub policy: PasswordPolicy,
    pub users: Arc<UserService>,
    pub auth: Arc<AuthService>,
    pub audit: AuditService,
}

impl Services {
    pub fn new(config: AppConfig, stores: Stores, notifier: Arc<dyn Notifier>) -> WdResult<Self> {
        let tokens = Arc::new(
            TokenService::new(&config.auth).map_err(|e| WdError::Config(e.to_string()))?,
        );
        let policy = PasswordPolicy::new(config.password_policy.clone());
        let audit = AuditService::new(Arc::clone(&stores.audit), config.audit.clone());

        let users = Arc::new(UserService::new(
            &stores,
            audit.clone(),
            Arc::clone(&tokens),
            policy.clone(),
            Arc::clone(&notifier),
        ));
        let auth = Arc::new(AuthService::new(
            &stores,
            audit.clone(),
            Arc::clone(&tokens),
            policy.clone(),
            notifier,
            &config,
        ));

        Ok(Self {
            config: Arc::new(config),
            stores,
            tokens,
            policy,
            users,
            auth,
            audit,
        })
    }

    /// Deactivate expired sessions and purge audit entries past retention
    pub async fn sweep(&self) -> WdResult<SweepReport> {
        let sessions_deactivated = self.auth.cleanup_expired_sessions().await?;
        let audit_entries_purged = self.audit.purge_expired(Utc::now()).await?;
        Ok(SweepReport {
            sessions_deactivated,
            audit_entries_purged,
        })
    }
}
