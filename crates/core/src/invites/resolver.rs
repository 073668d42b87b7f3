//! Invite preview

use tracing::debug;

use super::InvitePreview;
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::models::{Company, Invitation};
use crate::storage::{CompanyRepository, InvitationRepository};

impl Backend {
    /// Preview the invitation behind `token` without consuming it.
    ///
    /// Unauthenticated: possession of the token is the only credential.
    pub fn preview_invite(&self, token: &str) -> Result<InvitePreview> {
        let (invitation, company) = self.load_redeemable(token)?;

        Ok(InvitePreview {
            email: invitation.email,
            role: invitation.role,
            company_id: company.id,
            company_name: company.name,
        })
    }

    /// Look up a pending invitation and its company
    pub(crate) fn load_redeemable(&self, token: &str) -> Result<(Invitation, Company)> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::validation("token is required"));
        }

        let db = self.db()?;
        let invitation = db
            .find_invitation_by_token(token)?
            .ok_or_else(|| Error::NotFound("invitation".into()))?;

        if let Err(e) = invitation.ensure_redeemable(self.now()) {
            debug!(invite_id = %invitation.id, error = %e, "Invitation not redeemable");
            return Err(e);
        }

        let company = db
            .find_company_by_id(invitation.company_id)?
            .ok_or_else(|| Error::NotFound("company".into()))?;

        Ok((invitation, company))
    }
}
