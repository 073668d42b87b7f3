//! Backend handle
//!
//! Constructed once at process start and shared by reference with every
//! request handler. Owns the document store, the identity provider and
//! the clock; no global state.

use std::sync::{Arc, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::FleetConfig;
use crate::error::{Error, Result};
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::invites::{require, validate_email, AccountSummary};
use crate::models::{Company, Profile, Role, Session};
use crate::permissions::{CompanyAction, Guard, Principal};
use crate::storage::{lock, CompanyRepository, Database, ProfileRepository, SharedDatabase};

pub struct Backend {
    db: SharedDatabase,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    invite_ttl: Duration,
}

impl Backend {
    pub fn new(
        db: SharedDatabase,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        config: &FleetConfig,
    ) -> Self {
        Self {
            db,
            identity,
            clock,
            invite_ttl: config.invites.ttl(),
        }
    }

    /// Open the configured database with the local identity provider
    pub fn open(config: &FleetConfig) -> Result<Self> {
        config.validate()?;
        let path = config.database_path()?;
        let db = Database::open(&path)?.into_shared();
        info!(path = %path.display(), "Backend opened");
        Ok(Self::with_local_identity(db, Arc::new(SystemClock), config))
    }

    /// In-memory backend, for tests and demos
    pub fn in_memory(clock: Arc<dyn Clock>, config: &FleetConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open_in_memory()?.into_shared();
        Ok(Self::with_local_identity(db, clock, config))
    }

    fn with_local_identity(db: SharedDatabase, clock: Arc<dyn Clock>, config: &FleetConfig) -> Self {
        let identity = LocalIdentity::new(db.clone(), clock.clone(), config.identity.clone());
        Self::new(db, Arc::new(identity), clock, config)
    }

    pub(crate) fn db(&self) -> Result<MutexGuard<'_, Database>> {
        lock(&self.db)
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn invite_ttl(&self) -> Duration {
        self.invite_ttl
    }

    /// Resolve a bearer credential to the caller's principal
    pub fn resolve_principal(&self, bearer: Option<&str>) -> Result<Principal> {
        let bearer = bearer.ok_or(Error::Unauthenticated)?;
        let account_id = self.identity.verify_credential(bearer)?;

        // An identity with no profile belongs to no company
        let profile = self
            .db()?
            .find_profile_by_id(account_id)?
            .ok_or(Error::Forbidden)?;

        Ok(Principal::new(profile))
    }

    /// Resolve the caller and run the guard for `action` on `company_id`
    pub fn authorize(
        &self,
        bearer: Option<&str>,
        company_id: Uuid,
        action: CompanyAction,
    ) -> Result<Principal> {
        let principal = self.resolve_principal(bearer)?;
        Guard::authorize(&principal, company_id, action)?;
        Ok(principal)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = require("email", email)?;
        if password.is_empty() {
            return Err(Error::validation("password is required"));
        }
        self.identity.sign_in(email, password)
    }

    pub fn sign_out(&self, bearer: Option<&str>) -> Result<()> {
        let bearer = bearer.ok_or(Error::Unauthenticated)?;
        self.identity.verify_credential(bearer)?;
        self.identity.sign_out(bearer)
    }

    /// Create a company with its first admin
    #[instrument(skip(self, admin_password))]
    pub fn bootstrap_company(
        &self,
        company_name: &str,
        admin_email: &str,
        admin_password: &str,
        admin_display_name: &str,
    ) -> Result<AccountSummary> {
        let company_name = require("companyName", company_name)?;
        let admin_email = validate_email(admin_email)?;
        let admin_display_name = require("displayName", admin_display_name)?;

        // Identity first: it owns the email and password rules
        let account_id =
            self.identity
                .create_account(admin_email, admin_password, admin_display_name)?;

        let now = self.now();
        let company = Company::new(company_name.to_string(), now);
        self.db()?.create_company(&company)?;

        let profile = Profile::new(
            account_id,
            admin_email.to_string(),
            admin_display_name.to_string(),
            Role::Admin,
            company.id,
            now,
        );
        if !self.db()?.create_profile(&profile)? {
            return Err(Error::Upstream(format!("account {} already has a profile", account_id)));
        }

        info!(company_id = %company.id, account_id = %account_id, "Company bootstrapped");
        Ok(AccountSummary::new(&profile, &company))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_bootstrap_creates_admin() {
        let fx = Fixture::new();
        let (company_id, bearer) = fx.company("Acme", "boss@acme.com");

        let principal = fx.backend.resolve_principal(Some(&bearer)).unwrap();
        assert_eq!(principal.role(), Role::Admin);
        assert_eq!(principal.company_id(), company_id);
    }

    #[test]
    fn test_missing_bearer_is_unauthenticated() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.backend.resolve_principal(None),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            fx.backend.resolve_principal(Some("bogus")),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn test_identity_without_profile_is_forbidden() {
        let fx = Fixture::new();
        fx.backend
            .identity()
            .create_account("ghost@x.com", PASSWORD, "Ghost")
            .unwrap();
        let session = fx.backend.sign_in("ghost@x.com", PASSWORD).unwrap();

        assert!(matches!(
            fx.backend.resolve_principal(Some(&session.token)),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn test_sign_out_revokes_bearer() {
        let fx = Fixture::new();
        let (_, bearer) = fx.company("Acme", "boss@acme.com");

        fx.backend.sign_out(Some(&bearer)).unwrap();
        assert!(matches!(
            fx.backend.resolve_principal(Some(&bearer)),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn test_bootstrap_validates_input() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.backend
                .bootstrap_company("", "boss@acme.com", PASSWORD, "Admin"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            fx.backend
                .bootstrap_company("Acme", "not-an-email", PASSWORD, "Admin"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_config_rejected() {
        let mut config = FleetConfig::default();
        config.invites.ttl_days = 100_000_000;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        assert!(matches!(
            Backend::in_memory(clock, &config),
            Err(Error::Validation(_))
        ));
    }
}
