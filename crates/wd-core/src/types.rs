//! Roles and permissions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role. Ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin1,
    Admin2,
    Admin3,
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Superadmin,
        Role::Admin1,
        Role::Admin2,
        Role::Admin3,
        Role::User,
    ];

    /// Roles an administrator account may hold besides superadmin
    pub const ADMIN_TIERS: [Role; 3] = [Role::Admin1, Role::Admin2, Role::Admin3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin1 => "admin1",
            Role::Admin2 => "admin2",
            Role::Admin3 => "admin3",
            Role::User => "user",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Superadmin => "Super Admin",
            Role::Admin1 => "Admin 1",
            Role::Admin2 => "Admin 2",
            Role::Admin3 => "Admin 3",
            Role::User => "User",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Superadmin => "Full access including administrator management",
            Role::Admin1 | Role::Admin2 | Role::Admin3 => {
                "Administrator with user management permissions"
            }
            Role::User => "Regular user with basic permissions",
        }
    }

    /// Superadmin or any admin tier
    pub fn is_admin(&self) -> bool {
        !matches!(self, Role::User)
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }

    /// One of admin1/admin2/admin3
    pub fn is_admin_tier(&self) -> bool {
        Self::ADMIN_TIERS.contains(self)
    }

    /// Permissions granted by this role
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Superadmin => &[
                ManageAdmins,
                ManageUsers,
                ViewAuditLogs,
                ManageSystemSettings,
                ViewAnalytics,
                ManageRoles,
            ],
            Role::Admin1 | Role::Admin2 | Role::Admin3 => {
                &[ManageUsers, ViewAuditLogs, ViewAnalytics]
            }
            Role::User => &[ViewProfile, UpdateProfile],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Whether a holder of this role may manage accounts holding `target`
    pub fn can_manage_role(&self, target: Role) -> bool {
        match self {
            Role::Superadmin => target != Role::Superadmin,
            Role::Admin1 | Role::Admin2 | Role::Admin3 => target == Role::User,
            Role::User => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "admin1" => Ok(Role::Admin1),
            "admin2" => Ok(Role::Admin2),
            "admin3" => Ok(Role::Admin3),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Named capability checked by handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageAdmins,
    ManageUsers,
    ViewAuditLogs,
    ManageSystemSettings,
    ViewAnalytics,
    ManageRoles,
    ViewProfile,
    UpdateProfile,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageAdmins => "manage_admins",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAuditLogs => "view_audit_logs",
            Permission::ManageSystemSettings => "manage_system_settings",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ManageRoles => "manage_roles",
            Permission::ViewProfile => "view_profile",
            Permission::UpdateProfile => "update_profile",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
