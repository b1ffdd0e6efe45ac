//! User model
//!
//! Table: users

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wd_core::{Permission, Role};

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Unique, stored lowercase
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,

    pub role: Role,

    pub is_active: bool,
    pub is_verified: bool,
    pub is_locked: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: DateTime<Utc>,

    pub failed_login_attempts: i32,
    /// `None` while locked means the lock is permanent
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// Lock status of an account at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    TemporarilyLocked { remaining: Duration },
    PermanentlyLocked,
    /// Locked flag still set but `locked_until` has passed
    LockExpired,
}

impl User {
    /// Build a fresh account with default flags
    pub fn new(
        email: &str,
        password_hash: String,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            password_hash,
            first_name: first_name.into(),
            last_name: last_name.into(),
            avatar_url: None,
            role,
            is_active: true,
            is_verified: false,
            is_locked: false,
            created_at: now,
            updated_at: now,
            last_login: None,
            password_changed_at: now,
            failed_login_attempts: 0,
            locked_until: None,
            email_verified_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }

    pub fn can_manage_role(&self, role: Role) -> bool {
        self.role.can_manage_role(role)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn lock_state(&self, now: DateTime<Utc>) -> LockState {
        if !self.is_locked {
            return LockState::Unlocked;
        }
        match self.locked_until {
            None => LockState::PermanentlyLocked,
            Some(until) if until > now => LockState::TemporarilyLocked {
                remaining: until - now,
            },
            Some(_) => LockState::LockExpired,
        }
    }

    /// Whether the account may be used right now
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && matches!(
                self.lock_state(now),
                LockState::Unlocked | LockState::LockExpired
            )
    }

    pub fn lock(&mut self, until: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.is_locked = true;
        self.locked_until = until;
        self.updated_at = now;
    }

    pub fn unlock(&mut self, now: DateTime<Utc>) {
        self.is_locked = false;
        self.locked_until = None;
        self.failed_login_attempts = 0;
        self.updated_at = now;
    }
}

/// Filters for user search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    /// Case-insensitive match on email, first, last or full name
    pub search: Option<String>,
    pub role: Option<Role>,
    /// Restrict to any of these roles
    pub roles: Option<Vec<Role>>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_locked: Option<bool>,
}

impl UserFilter {
    /// Whether `user` passes every set criterion
    pub fn matches(&self, user: &User) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = user.email.to_lowercase().contains(&term)
                || user.first_name.to_lowercase().contains(&term)
                || user.last_name.to_lowercase().contains(&term)
                || format!("{} {}", user.first_name, user.last_name)
                    .to_lowercase()
                    .contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(roles) = &self.roles {
            if !roles.contains(&user.role) {
                return false;
            }
        }
        if let Some(active) = self.is_active {
            if user.is_active != active {
                return false;
            }
        }
        if let Some(verified) = self.is_verified {
            if user.is_verified != verified {
                return false;
            }
        }
        if let Some(locked) = self.is_locked {
            if user.is_locked != locked {
                return false;
            }
        }
        true
    }
}

/// Sortable user columns. Unknown names fall back to `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSort {
    Email,
    FirstName,
    LastName,
    Role,
    LastLogin,
    #[default]
    CreatedAt,
}

impl UserSort {
    pub fn parse(name: &str) -> Self {
        match name {
            "email" => UserSort::Email,
            "first_name" => UserSort::FirstName,
            "last_name" => UserSort::LastName,
            "role" => UserSort::Role,
            "last_login" => UserSort::LastLogin,
            _ => UserSort::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            UserSort::Email => "email",
            UserSort::FirstName => "first_name",
            UserSort::LastName => "last_name",
            UserSort::Role => "role",
            UserSort::LastLogin => "last_login",
            UserSort::CreatedAt => "created_at",
        }
    }
}
