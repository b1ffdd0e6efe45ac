//! Request and response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use wd_core::{PageParams, Role, SortDirection};
use wd_models::{AdminStats, AuditFilter, User, UserFilter, UserStats};
use wd_services::SessionView;

pub const TOKEN_TYPE: &str = "bearer";

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub logout_all_devices: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Present only when refresh tokens rotate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_current: bool,
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        let s = view.session;
        Self {
            id: s.id,
            device_info: s.device_info,
            ip_address: s.ip_address,
            user_agent: s.user_agent,
            created_at: s.created_at,
            last_used_at: s.last_used_at,
            expires_at: s.expires_at,
            is_current: view.is_current,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionResponse>,
}

#[derive(Debug, Serialize)]
pub struct TokenUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub user: TokenUser,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Full account view for administrators
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_login_attempts: i32,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            is_locked: user.is_locked,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
            failed_login_attempts: user.failed_login_attempts,
        }
    }
}

/// What a user sees about their own account
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Row in a user listing
#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            is_locked: user.is_locked,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    wd_core::pagination::DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_locked: Option<bool>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortDirection,
}

impl UserListQuery {
    pub fn filter(&self) -> UserFilter {
        UserFilter {
            search: self.search.clone(),
            role: self.role,
            is_active: self.is_active,
            is_verified: self.is_verified,
            is_locked: self.is_locked,
            ..Default::default()
        }
    }

    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: self.size,
            sort_by: self
                .sort_by
                .clone()
                .unwrap_or_else(|| "created_at".to_string()),
            sort_order: self.sort_order,
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    pub action: Option<String>,
    pub resource: Option<String>,
}

impl AuditLogQuery {
    pub fn filter(&self, user_id: Option<Uuid>) -> AuditFilter {
        AuditFilter {
            user_id,
            action: self.action.clone(),
            resource: self.resource.clone(),
        }
    }

    pub fn page_params(&self) -> PageParams {
        PageParams::new(self.page, self.size)
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AdminCounts {
    pub admin1: i64,
    pub admin2: i64,
    pub admin3: i64,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub total_admins: i64,
    pub active_admins: i64,
}

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub user_stats: UserStats,
    pub admin_stats: AdminCounts,
    pub system_info: SystemInfo,
}

impl SystemStats {
    pub fn new(user_stats: UserStats, admins: &AdminStats) -> Self {
        Self {
            user_stats,
            admin_stats: AdminCounts {
                admin1: admins.admin1_count,
                admin2: admins.admin2_count,
                admin3: admins.admin3_count,
            },
            system_info: SystemInfo {
                total_admins: admins.total(),
                active_admins: admins.total_active(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub value: Role,
    pub label: &'static str,
    pub description: &'static str,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            value: role,
            label: role.label(),
            description: role.description(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub admin_roles: Vec<RoleInfo>,
    pub user_roles: Vec<RoleInfo>,
}

impl RolesResponse {
    pub fn new() -> Self {
        Self {
            admin_roles: Role::ADMIN_TIERS.into_iter().map(RoleInfo::from).collect(),
            user_roles: vec![RoleInfo::from(Role::User)],
        }
    }
}

impl Default for RolesResponse {
    fn default() -> Self {
        Self::new()
    }
}
