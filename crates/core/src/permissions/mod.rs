//! Authorization guard for company-scoped operations
//!
//! Every mutating or sensitive operation names a [`CompanyAction`]; the
//! [`Guard`] admits the caller only when their profile belongs to the
//! target company, is active, and holds one of the action's allowed roles.

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Profile, Role};

/// Actions that can be performed within a company
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyAction {
    // Invitations
    InviteManager,
    InviteDriver,
    ListInvitations,

    // Member directory
    ListMembers,
    UpdateMemberStatus,
}

/// Permission matrix for company roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Roles allowed to perform an action
    pub fn allowed_roles(action: CompanyAction) -> &'static [Role] {
        match action {
            CompanyAction::InviteManager => &[Role::Admin],
            CompanyAction::InviteDriver
            | CompanyAction::ListInvitations
            | CompanyAction::ListMembers
            | CompanyAction::UpdateMemberStatus => &[Role::Admin, Role::Manager],
        }
    }

    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Role, action: CompanyAction) -> bool {
        Self::allowed_roles(action).contains(&role)
    }

    /// The action that issuing an invitation for `role` requires
    pub fn invite_action(role: Role) -> Option<CompanyAction> {
        match role {
            Role::Manager => Some(CompanyAction::InviteManager),
            Role::Driver => Some(CompanyAction::InviteDriver),
            Role::Admin => None,
        }
    }

    /// Check if an actor may change another member's profile
    pub fn can_manage(actor_role: Role, target_role: Role) -> bool {
        // Can only manage roles lower than your own
        if target_role >= actor_role {
            return false;
        }

        actor_role >= Role::Manager
    }
}

/// The authenticated caller with their resolved profile
#[derive(Debug, Clone)]
pub struct Principal {
    pub profile: Profile,
}

impl Principal {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    pub fn account_id(&self) -> Uuid {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn company_id(&self) -> Uuid {
        self.profile.company_id
    }
}

/// Stateless company/role predicate
pub struct Guard;

impl Guard {
    /// Admit `principal` to `action` on a resource owned by `company_id`.
    ///
    /// Every failure is the same bare `Forbidden`.
    pub fn authorize(principal: &Principal, company_id: Uuid, action: CompanyAction) -> Result<()> {
        let admitted = principal.profile.is_active()
            && principal.company_id() == company_id
            && PermissionMatrix::can_perform(principal.role(), action);

        if !admitted {
            debug!(
                account_id = %principal.account_id(),
                action = ?action,
                "Authorization denied"
            );
            return Err(Error::Forbidden);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileStatus;
    use chrono::Utc;

    fn principal(role: Role, company_id: Uuid) -> Principal {
        Principal::new(Profile::new(
            Uuid::new_v4(),
            "p@x.com".into(),
            "P".into(),
            role,
            company_id,
            Utc::now(),
        ))
    }

    #[test]
    fn test_invite_policy() {
        assert!(PermissionMatrix::can_perform(Role::Admin, CompanyAction::InviteManager));
        assert!(!PermissionMatrix::can_perform(Role::Manager, CompanyAction::InviteManager));
        assert!(PermissionMatrix::can_perform(Role::Manager, CompanyAction::InviteDriver));
        assert!(PermissionMatrix::can_perform(Role::Admin, CompanyAction::InviteDriver));
        assert!(!PermissionMatrix::can_perform(Role::Driver, CompanyAction::InviteDriver));
        assert_eq!(PermissionMatrix::invite_action(Role::Admin), None);
    }

    #[test]
    fn test_can_manage() {
        assert!(PermissionMatrix::can_manage(Role::Admin, Role::Manager));
        assert!(PermissionMatrix::can_manage(Role::Manager, Role::Driver));
        assert!(!PermissionMatrix::can_manage(Role::Manager, Role::Manager));
        assert!(!PermissionMatrix::can_manage(Role::Driver, Role::Driver));
        assert!(!PermissionMatrix::can_manage(Role::Manager, Role::Admin));
    }

    #[test]
    fn test_guard_company_mismatch() {
        let company = Uuid::new_v4();
        let admin = principal(Role::Admin, company);

        assert!(Guard::authorize(&admin, company, CompanyAction::InviteManager).is_ok());
        assert!(matches!(
            Guard::authorize(&admin, Uuid::new_v4(), CompanyAction::InviteManager),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn test_guard_inactive_principal() {
        let company = Uuid::new_v4();
        let mut manager = principal(Role::Manager, company);
        manager.profile.status = ProfileStatus::Inactive;

        assert!(matches!(
            Guard::authorize(&manager, company, CompanyAction::ListMembers),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn test_guard_role_denied() {
        let company = Uuid::new_v4();
        let driver = principal(Role::Driver, company);
        assert!(matches!(
            Guard::authorize(&driver, company, CompanyAction::ListMembers),
            Err(Error::Forbidden)
        ));
    }
}
