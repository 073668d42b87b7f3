//! Company member directory
//!
//! Guarded reads and status changes over a company's profiles.

use tracing::info;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::models::{Profile, ProfileStatus, Role};
use crate::permissions::{CompanyAction, PermissionMatrix};
use crate::storage::ProfileRepository;

impl Backend {
    /// List a company's members, oldest first
    pub fn list_members(
        &self,
        bearer: Option<&str>,
        company_id: Uuid,
        role: Option<Role>,
    ) -> Result<Vec<Profile>> {
        self.authorize(bearer, company_id, CompanyAction::ListMembers)?;
        self.db()?.list_profiles_for_company(company_id, role)
    }

    /// Activate or deactivate a member the caller outranks.
    ///
    /// A target outside the caller's company is reported as `Forbidden`,
    /// the same as a missing one.
    pub fn set_member_status(
        &self,
        bearer: Option<&str>,
        company_id: Uuid,
        profile_id: Uuid,
        status: ProfileStatus,
    ) -> Result<Profile> {
        let principal = self.authorize(bearer, company_id, CompanyAction::UpdateMemberStatus)?;

        let db = self.db()?;
        let target = db
            .find_profile_by_id(profile_id)?
            .filter(|p| p.company_id == company_id)
            .ok_or(Error::Forbidden)?;

        if !PermissionMatrix::can_manage(principal.role(), target.role) {
            return Err(Error::Forbidden);
        }

        let now = self.now();
        if !db.update_profile_status(profile_id, status, now)? {
            return Err(Error::NotFound("profile".into()));
        }

        info!(
            profile_id = %profile_id,
            changed_by = %principal.account_id(),
            status = status.as_str(),
            "Member status changed"
        );

        Ok(Profile {
            status,
            updated_at: now,
            ..target
        })
    }
}
