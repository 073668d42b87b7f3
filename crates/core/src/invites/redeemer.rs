//! Invite redemption
//!
//! Redemption spans two systems: the identity provider owns the account,
//! the document store owns the profile and the invitation. The writes run
//! as an ordered saga:
//!
//! 1. [`RedemptionStep::CreateIdentity`]
//! 2. [`RedemptionStep::CreateProfile`], keyed by the new account id
//! 3. [`RedemptionStep::ConsumeInvite`], a conditional write
//!
//! A crash after step 1 leaves an orphaned identity and a pending invite.
//! Retrying with the same token, email and password resumes from the first
//! step that has not completed instead of failing with `EmailTaken`.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{optional, validate_email, AccountSummary, RedeemInviteRequest};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::models::{Invitation, Profile};
use crate::storage::{InvitationRepository, ProfileRepository};

/// Saga step a redemption starts or resumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionStep {
    CreateIdentity,
    CreateProfile,
    ConsumeInvite,
}

impl Backend {
    /// Redeem an invitation into a new account and company profile.
    ///
    /// Role and company always come from the stored invitation.
    #[instrument(skip(self, request))]
    pub fn redeem_invite(&self, request: &RedeemInviteRequest) -> Result<AccountSummary> {
        let email = validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(Error::validation("password is required"));
        }

        let (invitation, company) = self.load_redeemable(&request.token)?;

        if email != invitation.email {
            debug!(invite_id = %invitation.id, "Redemption email mismatch");
            return Err(Error::EmailMismatch);
        }

        let display_name = optional(request.display_name.as_deref())
            .unwrap_or_else(|| invitation.invitee_name.clone());

        let (account_id, step, resumed) = match self.identity().create_account(
            email,
            &request.password,
            &display_name,
        ) {
            Ok(account_id) => (account_id, RedemptionStep::CreateProfile, false),
            Err(Error::EmailTaken) => {
                let (account_id, step) =
                    self.resume_point(email, &request.password, &invitation)?;
                (account_id, step, true)
            }
            Err(e) => return Err(e),
        };

        let (profile, created) = match step {
            RedemptionStep::CreateProfile => {
                let profile = Profile::new(
                    account_id,
                    invitation.email.clone(),
                    display_name,
                    invitation.role,
                    invitation.company_id,
                    self.now(),
                )
                .with_phone_number(invitation.phone_number.clone());
                if self.db()?.create_profile(&profile)? {
                    (profile, true)
                } else {
                    // A concurrent retry for the same account got there first
                    (self.existing_profile(account_id, &invitation)?, false)
                }
            }
            RedemptionStep::ConsumeInvite | RedemptionStep::CreateIdentity => {
                (self.existing_profile(account_id, &invitation)?, false)
            }
        };

        if let Err(e) = self.consume(&invitation, account_id) {
            if created {
                // Another account won; drop the membership only we wrote
                self.db()?.delete_profile(account_id)?;
            }
            return Err(e);
        }

        info!(
            invite_id = %invitation.id,
            account_id = %account_id,
            company_id = %company.id,
            role = %profile.role,
            resumed,
            "Invitation redeemed"
        );

        Ok(AccountSummary::new(&profile, &company))
    }

    /// Where a retried redemption picks up when the email is already
    /// registered. Only the password holder can resume, and only into the
    /// invitation's own company and role.
    fn resume_point(
        &self,
        email: &str,
        password: &str,
        invitation: &Invitation,
    ) -> Result<(Uuid, RedemptionStep)> {
        let account_id = match self.identity().check_credentials(email, password) {
            Ok(account_id) => account_id,
            Err(Error::InvalidCredential) => return Err(Error::EmailTaken),
            Err(e) => return Err(e),
        };

        let step = match self.db()?.find_profile_by_id(account_id)? {
            None => RedemptionStep::CreateProfile,
            Some(profile)
                if profile.company_id == invitation.company_id
                    && profile.role == invitation.role =>
            {
                RedemptionStep::ConsumeInvite
            }
            Some(_) => return Err(Error::EmailTaken),
        };

        warn!(
            account_id = %account_id,
            invite_id = %invitation.id,
            step = ?step,
            "Resuming interrupted redemption"
        );
        Ok((account_id, step))
    }

    /// Profile already held by `account_id`, accepted only if it is the
    /// membership this invitation grants
    fn existing_profile(&self, account_id: Uuid, invitation: &Invitation) -> Result<Profile> {
        match self.db()?.find_profile_by_id(account_id)? {
            Some(profile)
                if profile.company_id == invitation.company_id
                    && profile.role == invitation.role =>
            {
                Ok(profile)
            }
            Some(_) => Err(Error::EmailTaken),
            None => Err(Error::Upstream("resumed profile disappeared".into())),
        }
    }

    /// Mark the invitation used. Losing to another account is `InviteUsed`;
    /// losing to a concurrent retry of this same account is success.
    fn consume(&self, invitation: &Invitation, account_id: Uuid) -> Result<()> {
        let db = self.db()?;
        if db.consume_invitation(&invitation.token, account_id, self.now())? {
            return Ok(());
        }

        match db.find_invitation_by_token(&invitation.token)? {
            Some(current) if current.used_by == Some(account_id) => {
                debug!(
                    invite_id = %invitation.id,
                    account_id = %account_id,
                    "Invitation already consumed by this account"
                );
                Ok(())
            }
            Some(current) if current.used => Err(Error::InviteUsed),
            Some(_) => Err(Error::Upstream("invitation update did not apply".into())),
            None => Err(Error::NotFound("invitation".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::*;
    use crate::config::IdentitySettings;
    use crate::error::ErrorKind;
    use crate::identity::{fast_argon2, IdentityProvider, LocalIdentity};
    use crate::invites::IssueInviteRequest;
    use crate::models::{InvitationState, ProfileStatus, Role, Session};
    use crate::storage::{lock, SharedDatabase};
    use chrono::{Duration, Utc};
    use std::sync::{Arc, Mutex};

    fn issue(fx: &Fixture, role: Role, email: &str) -> (Uuid, String) {
        let (company_id, admin) = fx.company("Acme", "boss@acme.com");
        let issued = fx
            .backend
            .issue_invite(
                Some(&admin),
                &IssueInviteRequest {
                    invitee_name: "Jane Doe".into(),
                    invitee_email: email.into(),
                    company_id,
                    role,
                    phone_number: Some("+15550100".into()),
                },
            )
            .unwrap();
        (company_id, issued.token)
    }

    fn redeem(token: &str, email: &str) -> RedeemInviteRequest {
        RedeemInviteRequest {
            token: token.into(),
            email: email.into(),
            password: PASSWORD.into(),
            display_name: None,
        }
    }

    fn invitation(fx: &Fixture, token: &str) -> Invitation {
        lock(&fx.db)
            .unwrap()
            .find_invitation_by_token(token)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_end_to_end_manager_invite() {
        let fx = Fixture::new();
        let (company_id, token) = issue(&fx, Role::Manager, "jane@x.com");

        let preview = fx.backend.preview_invite(&token).unwrap();
        assert_eq!(preview.email, "jane@x.com");
        assert_eq!(preview.role, Role::Manager);
        assert_eq!(preview.company_id, company_id);

        let summary = fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).unwrap();
        assert_eq!(summary.email, "jane@x.com");
        assert_eq!(summary.display_name, "Jane Doe");
        assert_eq!(summary.role, Role::Manager);
        assert_eq!(summary.company_id, company_id);
        assert_eq!(summary.company_name, "Acme");

        let stored = invitation(&fx, &token);
        assert!(stored.used);
        assert_eq!(stored.used_by, Some(summary.account_id));
        assert_eq!(stored.used_at, Some(fx.clock.now()));

        let profile = lock(&fx.db)
            .unwrap()
            .find_profile_by_id(summary.account_id)
            .unwrap()
            .unwrap();
        assert_eq!(profile.status, ProfileStatus::Active);
        assert_eq!(profile.phone_number.as_deref(), Some("+15550100"));

        let session = fx.backend.sign_in("jane@x.com", PASSWORD).unwrap();
        let principal = fx.backend.resolve_principal(Some(&session.token)).unwrap();
        assert_eq!(principal.role(), Role::Manager);

        let again = fx.backend.redeem_invite(&redeem(&token, "jane@x.com"));
        assert!(matches!(again, Err(Error::InviteUsed)));
    }

    #[test]
    fn test_expired_invite_cannot_be_redeemed() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "jane@x.com");

        fx.clock.advance(Duration::days(8));
        let err = fx
            .backend
            .redeem_invite(&redeem(&token, "jane@x.com"))
            .unwrap_err();
        assert!(matches!(err, Error::InviteExpired));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_email_mismatch_creates_nothing() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "jane@x.com");

        for email in ["mallory@x.com", "Jane@x.com"] {
            let err = fx.backend.redeem_invite(&redeem(&token, email)).unwrap_err();
            assert!(matches!(err, Error::EmailMismatch));
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        assert!(fx.backend.sign_in("mallory@x.com", PASSWORD).is_err());
        assert_eq!(
            invitation(&fx, &token).state_at(fx.clock.now()),
            InvitationState::Pending
        );
    }

    #[test]
    fn test_client_supplied_role_is_ignored() {
        let fx = Fixture::new();
        let (company_id, token) = issue(&fx, Role::Driver, "jane@x.com");

        let json = format!(
            r#"{{"token":"{}","email":"jane@x.com","password":"{}","role":"admin","companyId":"{}"}}"#,
            token,
            PASSWORD,
            Uuid::new_v4()
        );
        let request: RedeemInviteRequest = serde_json::from_str(&json).unwrap();

        let summary = fx.backend.redeem_invite(&request).unwrap();
        assert_eq!(summary.role, Role::Driver);
        assert_eq!(summary.company_id, company_id);
    }

    #[test]
    fn test_weak_password_leaves_invite_pending() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "jane@x.com");

        let mut request = redeem(&token, "jane@x.com");
        request.password = "short".into();
        let err = fx.backend.redeem_invite(&request).unwrap_err();
        assert!(matches!(err, Error::WeakPassword(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(!invitation(&fx, &token).used);
        assert!(fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).is_ok());
    }

    #[test]
    fn test_resume_after_orphaned_identity() {
        let fx = Fixture::new();
        let (company_id, token) = issue(&fx, Role::Manager, "jane@x.com");

        // Interrupted after step 1
        fx.backend
            .identity()
            .create_account("jane@x.com", PASSWORD, "Jane Doe")
            .unwrap();

        let summary = fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).unwrap();
        assert_eq!(summary.role, Role::Manager);
        assert_eq!(summary.company_id, company_id);
        assert!(invitation(&fx, &token).used);
    }

    #[test]
    fn test_resume_after_profile_created() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "jane@x.com");

        // Interrupted after step 2
        let stored = invitation(&fx, &token);
        let account_id = fx
            .backend
            .identity()
            .create_account("jane@x.com", PASSWORD, "Jane Doe")
            .unwrap();
        let profile = Profile::new(
            account_id,
            stored.email.clone(),
            "Jane Doe".into(),
            stored.role,
            stored.company_id,
            fx.clock.now(),
        );
        lock(&fx.db).unwrap().create_profile(&profile).unwrap();

        let summary = fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).unwrap();
        assert_eq!(summary.account_id, account_id);
        assert_eq!(invitation(&fx, &token).used_by, Some(account_id));
    }

    #[test]
    fn test_registered_email_with_wrong_password() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "jane@x.com");
        fx.backend
            .identity()
            .create_account("jane@x.com", "someone else's secret", "Jane")
            .unwrap();

        let err = fx
            .backend
            .redeem_invite(&redeem(&token, "jane@x.com"))
            .unwrap_err();
        assert!(matches!(err, Error::EmailTaken));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(!invitation(&fx, &token).used);
    }

    #[test]
    fn test_existing_member_of_other_company_is_taken() {
        let fx = Fixture::new();
        let (_, token) = issue(&fx, Role::Driver, "boss@globex.com");
        fx.company("Globex", "boss@globex.com");

        let err = fx
            .backend
            .redeem_invite(&redeem(&token, "boss@globex.com"))
            .unwrap_err();
        assert!(matches!(err, Error::EmailTaken));
    }

    #[test]
    fn test_same_account_retry_consuming_first_keeps_profile() {
        let fx = Fixture::new();
        let (company_id, token) = issue(&fx, Role::Driver, "jane@x.com");

        // A double submit that finishes between our profile write and our consume
        lock(&fx.db)
            .unwrap()
            .execute_batch(
                "CREATE TEMP TRIGGER concurrent_retry AFTER INSERT ON profiles
                 BEGIN
                     UPDATE invitations SET used = 1, used_at = NEW.created_at, used_by = NEW.id
                     WHERE used = 0;
                 END;",
            )
            .unwrap();

        let summary = fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).unwrap();
        assert_eq!(summary.company_id, company_id);

        let stored = invitation(&fx, &token);
        assert!(stored.used);
        assert_eq!(stored.used_by, Some(summary.account_id));

        let profile = lock(&fx.db)
            .unwrap()
            .find_profile_by_id(summary.account_id)
            .unwrap();
        assert_eq!(profile.map(|p| p.role), Some(Role::Driver));
    }

    /// What a concurrent redemption does right after our account is created
    enum Race {
        /// Another account consumes the invite
        OtherAccount(String),
        /// A retry for the same account writes the profile and consumes the invite
        SameAccount(String),
    }

    /// Lets a concurrent redeemer run between account creation and our profile write
    struct RacingIdentity {
        inner: LocalIdentity,
        db: SharedDatabase,
        race: Arc<Mutex<Option<Race>>>,
    }

    impl IdentityProvider for RacingIdentity {
        fn create_account(&self, email: &str, password: &str, display_name: &str) -> Result<Uuid> {
            let id = self.inner.create_account(email, password, display_name)?;
            let race = self.race.lock().unwrap().take();
            let db = lock(&self.db)?;
            match race {
                Some(Race::OtherAccount(token)) => {
                    assert!(db.consume_invitation(&token, Uuid::new_v4(), Utc::now())?);
                }
                Some(Race::SameAccount(token)) => {
                    let invitation = db.find_invitation_by_token(&token)?.unwrap();
                    let profile = Profile::new(
                        id,
                        invitation.email,
                        "Jane from the other tab".into(),
                        invitation.role,
                        invitation.company_id,
                        Utc::now(),
                    );
                    assert!(db.create_profile(&profile)?);
                    assert!(db.consume_invitation(&token, id, Utc::now())?);
                }
                None => {}
            }
            Ok(id)
        }

        fn check_credentials(&self, email: &str, password: &str) -> Result<Uuid> {
            self.inner.check_credentials(email, password)
        }

        fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
            self.inner.sign_in(email, password)
        }

        fn verify_credential(&self, bearer: &str) -> Result<Uuid> {
            self.inner.verify_credential(bearer)
        }

        fn sign_out(&self, bearer: &str) -> Result<()> {
            self.inner.sign_out(bearer)
        }
    }

    fn racing_fixture() -> (Fixture, Arc<Mutex<Option<Race>>>) {
        let race = Arc::new(Mutex::new(None));
        let slot = race.clone();
        let fx = Fixture::with_identity(move |db, clock| {
            Arc::new(RacingIdentity {
                inner: LocalIdentity::new(db.clone(), clock, IdentitySettings::default())
                    .with_argon2(fast_argon2()),
                db,
                race: slot,
            })
        });
        (fx, race)
    }

    #[test]
    fn test_lost_race_reports_used() {
        let (fx, race) = racing_fixture();
        let (company_id, token) = issue(&fx, Role::Driver, "jane@x.com");
        *race.lock().unwrap() = Some(Race::OtherAccount(token.clone()));

        let err = fx
            .backend
            .redeem_invite(&redeem(&token, "jane@x.com"))
            .unwrap_err();
        assert!(matches!(err, Error::InviteUsed));

        // The loser keeps no membership
        let members = lock(&fx.db)
            .unwrap()
            .list_profiles_for_company(company_id, Some(Role::Driver))
            .unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn test_same_account_profile_already_written_is_success() {
        let (fx, race) = racing_fixture();
        let (company_id, token) = issue(&fx, Role::Driver, "jane@x.com");
        *race.lock().unwrap() = Some(Race::SameAccount(token.clone()));

        let summary = fx.backend.redeem_invite(&redeem(&token, "jane@x.com")).unwrap();
        assert_eq!(summary.display_name, "Jane from the other tab");
        assert_eq!(invitation(&fx, &token).used_by, Some(summary.account_id));

        let members = lock(&fx.db)
            .unwrap()
            .list_profiles_for_company(company_id, Some(Role::Driver))
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, summary.account_id);
    }
}
