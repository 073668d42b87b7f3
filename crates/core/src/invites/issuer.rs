//! Invite issuance

use tracing::{info, instrument};
use uuid::Uuid;

use super::{optional, require, validate_email, IssueInviteRequest, IssuedInvite};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::models::{Invitation, InvitationSummary};
use crate::permissions::{CompanyAction, Guard, PermissionMatrix};
use crate::storage::InvitationRepository;
use crate::token::generate_token;

impl Backend {
    /// Issue an invitation on behalf of the bearer's principal.
    ///
    /// Only admins invite managers; admins and managers invite drivers;
    /// nobody invites into another company.
    #[instrument(skip(self, bearer, request), fields(company_id = %request.company_id, role = %request.role))]
    pub fn issue_invite(
        &self,
        bearer: Option<&str>,
        request: &IssueInviteRequest,
    ) -> Result<IssuedInvite> {
        let principal = self.resolve_principal(bearer)?;

        let invitee_name = require("inviteeName", &request.invitee_name)?;
        let invitee_email = validate_email(&request.invitee_email)?;
        let action = PermissionMatrix::invite_action(request.role).ok_or_else(|| {
            Error::validation(format!("{} accounts cannot be invited", request.role))
        })?;

        Guard::authorize(&principal, request.company_id, action)?;

        let invitation = Invitation::new(
            generate_token(),
            invitee_email.to_string(),
            invitee_name.to_string(),
            request.role,
            request.company_id,
            principal.account_id(),
            self.now(),
            self.invite_ttl(),
        )
        .with_phone_number(optional(request.phone_number.as_deref()));

        self.db()?.create_invitation(&invitation)?;

        info!(
            invite_id = %invitation.id,
            issued_by = %principal.account_id(),
            expires_at = %invitation.expires_at,
            "Invitation issued"
        );

        Ok(IssuedInvite {
            invite_id: invitation.id,
            token: invitation.token,
            expires_at: invitation.expires_at,
        })
    }

    /// List a company's invitations with their current state
    pub fn list_invitations(
        &self,
        bearer: Option<&str>,
        company_id: Uuid,
    ) -> Result<Vec<InvitationSummary>> {
        self.authorize(bearer, company_id, CompanyAction::ListInvitations)?;

        let now = self.now();
        let invitations = self.db()?.list_invitations_for_company(company_id)?;
        Ok(invitations.iter().map(|i| i.summary(now)).collect())
    }
}
