//! Permission checks between an acting user and the accounts it touches

use wd_core::{Permission, Role};
use wd_models::User;

/// Answers "may `actor` do X to `target`" questions
#[derive(Debug, Clone, Copy)]
pub struct PermissionChecker<'a> {
    actor: &'a User,
}

impl<'a> PermissionChecker<'a> {
    pub fn new(actor: &'a User) -> Self {
        Self { actor }
    }

    fn is_self(&self, target: &User) -> bool {
        self.actor.id == target.id
    }

    /// Modify, lock or delete `target`
    pub fn can_manage_user(&self, target: &User) -> bool {
        match self.actor.role {
            Role::Superadmin => target.role != Role::Superadmin || self.is_self(target),
            Role::Admin1 | Role::Admin2 | Role::Admin3 => target.role == Role::User,
            Role::User => self.is_self(target),
        }
    }

    pub fn can_view_user(&self, target: &User) -> bool {
        match self.actor.role {
            Role::Superadmin => true,
            Role::Admin1 | Role::Admin2 | Role::Admin3 => {
                target.role == Role::User || self.is_self(target)
            }
            Role::User => self.is_self(target),
        }
    }

    /// Give some account `role`
    pub fn can_assign_role(&self, role: Role) -> bool {
        if role.is_admin() {
            self.actor.is_superadmin()
        } else {
            self.actor.is_admin()
        }
    }

    pub fn can_access_audit_logs(&self) -> bool {
        self.actor.has_permission(Permission::ViewAuditLogs)
    }

    pub fn can_view_analytics(&self) -> bool {
        self.actor.has_permission(Permission::ViewAnalytics)
    }

    pub fn can_manage_admins(&self) -> bool {
        self.actor.has_permission(Permission::ManageAdmins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User::new(
            &format!("{}@example.com", role),
            "hash".into(),
            "First",
            "Last",
            role,
            Utc::now(),
        )
    }

    #[test]
    fn test_superadmin_manages_everyone_but_superadmins() {
        let root = user(Role::Superadmin);
        let checker = PermissionChecker::new(&root);
        assert!(checker.can_manage_user(&user(Role::Admin1)));
        assert!(checker.can_manage_user(&user(Role::User)));
        assert!(!checker.can_manage_user(&user(Role::Superadmin)));
        assert!(checker.can_manage_user(&root));
        assert!(checker.can_view_user(&user(Role::Superadmin)));
    }

    #[test]
    fn test_admin_manages_plain_users_only() {
        let admin = user(Role::Admin2);
        let checker = PermissionChecker::new(&admin);
        assert!(checker.can_manage_user(&user(Role::User)));
        assert!(!checker.can_manage_user(&user(Role::Admin3)));
        assert!(checker.can_view_user(&user(Role::User)));
        assert!(!checker.can_view_user(&user(Role::Admin1)));
        assert!(checker.can_view_user(&admin));
        assert!(!checker.can_manage_user(&admin));
    }

    #[test]
    fn test_user_only_self() {
        let me = user(Role::User);
        let checker = PermissionChecker::new(&me);
        assert!(checker.can_manage_user(&me));
        assert!(checker.can_view_user(&me));
        assert!(!checker.can_manage_user(&user(Role::User)));
        assert!(!checker.can_view_user(&user(Role::User)));
    }

    #[test]
    fn test_role_assignment() {
        let root = user(Role::Superadmin);
        let admin = user(Role::Admin1);
        let plain = user(Role::User);

        assert!(PermissionChecker::new(&root).can_assign_role(Role::Admin3));
        assert!(PermissionChecker::new(&root).can_assign_role(Role::Superadmin));
        assert!(!PermissionChecker::new(&admin).can_assign_role(Role::Admin1));
        assert!(PermissionChecker::new(&admin).can_assign_role(Role::User));
        assert!(!PermissionChecker::new(&plain).can_assign_role(Role::User));
    }

    #[test]
    fn test_capabilities() {
        let admin = user(Role::Admin3);
        let plain = user(Role::User);
        assert!(PermissionChecker::new(&admin).can_access_audit_logs());
        assert!(PermissionChecker::new(&admin).can_view_analytics());
        assert!(!PermissionChecker::new(&admin).can_manage_admins());
        assert!(!PermissionChecker::new(&plain).can_access_audit_logs());
    }
}
