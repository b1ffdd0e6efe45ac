//! Audit trail
//!
//! Table: audit_logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Action names written to the audit trail
pub struct AuditAction;

impl AuditAction {
    pub const USER_CREATED: &'static str = "user_created";
    pub const USER_UPDATED: &'static str = "user_updated";
    pub const PROFILE_UPDATED: &'static str = "profile_updated";
    pub const PASSWORD_CHANGED: &'static str = "password_changed";
    pub const USER_DELETED: &'static str = "user_deleted";
    pub const USER_LOCKED: &'static str = "user_locked";
    pub const USER_UNLOCKED: &'static str = "user_unlocked";
    pub const LOGIN_SUCCESSFUL: &'static str = "login_successful";
    pub const LOGIN_FAILED: &'static str = "login_failed";
    pub const ACCOUNT_LOCKED_FAILED_ATTEMPTS: &'static str = "account_locked_failed_attempts";
    pub const TOKEN_REFRESHED: &'static str = "token_refreshed";
    pub const LOGOUT: &'static str = "logout";
    pub const LOGOUT_ALL_DEVICES: &'static str = "logout_all_devices";
    pub const PASSWORD_RESET_REQUESTED: &'static str = "password_reset_requested";
    pub const PASSWORD_RESET_COMPLETED: &'static str = "password_reset_completed";
    pub const SESSION_REVOKED: &'static str = "session_revoked";
    pub const EMAIL_VERIFIED: &'static str = "email_verified";
}

/// Resource names used in audit records
pub struct AuditResource;

impl AuditResource {
    pub const USER: &'static str = "user";
    pub const SESSION: &'static str = "session";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    /// Acting user, if any
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(action: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            action: action.into(),
            resource: None,
            resource_id: None,
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
        }
    }

    pub fn actor(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn resource(mut self, resource: &str, resource_id: impl ToString) -> Self {
        self.resource = Some(resource.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn origin(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Filters for audit log listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLog) -> bool {
        if self.user_id.is_some() && entry.user_id != self.user_id {
            return false;
        }
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if entry.resource.as_ref() != Some(resource) {
                return false;
            }
        }
        true
    }
}
