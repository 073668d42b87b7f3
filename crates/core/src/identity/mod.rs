//! Identity provider
//!
//! The identity half of an account: credentials and bearer sessions. The
//! backend talks to it only through [`IdentityProvider`], so a hosted
//! provider can replace [`LocalIdentity`] without touching the invite flow.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::IdentitySettings;
use crate::error::{Error, Result};
use crate::models::{Account, Session};
use crate::storage::{lock, SharedDatabase};
use crate::token::generate_token;

pub trait IdentityProvider: Send + Sync {
    /// Register a new account.
    ///
    /// Fails with `EmailTaken` or `WeakPassword` for the provider's own
    /// domain rules.
    fn create_account(&self, email: &str, password: &str, display_name: &str) -> Result<Uuid>;

    /// Verify an email/password pair without opening a session
    fn check_credentials(&self, email: &str, password: &str) -> Result<Uuid>;

    /// Verify credentials and open a bearer session
    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Resolve a bearer credential to its account id
    fn verify_credential(&self, bearer: &str) -> Result<Uuid>;

    /// Revoke a bearer credential
    fn sign_out(&self, bearer: &str) -> Result<()>;
}

/// SQLite-backed identity provider with argon2 password hashes
pub struct LocalIdentity {
    db: SharedDatabase,
    clock: Arc<dyn Clock>,
    settings: IdentitySettings,
    argon2: Argon2<'static>,
}

impl LocalIdentity {
    pub fn new(db: SharedDatabase, clock: Arc<dyn Clock>, settings: IdentitySettings) -> Self {
        Self {
            db,
            clock,
            settings,
            argon2: Argon2::default(),
        }
    }

    /// Use custom argon2 parameters
    pub fn with_argon2(mut self, argon2: Argon2<'static>) -> Self {
        self.argon2 = argon2;
        self
    }

    fn check_strength(&self, password: &str) -> Result<()> {
        let min = self.settings.min_password_length;
        if password.chars().count() < min {
            return Err(Error::WeakPassword(format!(
                "must be at least {} characters",
                min
            )));
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Upstream(format!("password hashing failed: {}", e)))
    }

    fn password_matches(&self, stored_hash: &str, password: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn find_account(&self, email: &str) -> Result<Option<Account>> {
        let db = lock(&self.db)?;
        db.accounts().find_by_email(email)
    }
}

impl IdentityProvider for LocalIdentity {
    #[instrument(skip(self, password, display_name))]
    fn create_account(&self, email: &str, password: &str, display_name: &str) -> Result<Uuid> {
        self.check_strength(password)?;

        // Hash before taking the lock; argon2 is deliberately slow
        let password_hash = self.hash_password(password)?;
        let account = Account::new(
            email.to_string(),
            display_name.to_string(),
            password_hash,
            self.clock.now(),
        );

        let db = lock(&self.db)?;
        if !db.accounts().create(&account)? {
            return Err(Error::EmailTaken);
        }

        info!(account_id = %account.id, "Account created");
        Ok(account.id)
    }

    fn check_credentials(&self, email: &str, password: &str) -> Result<Uuid> {
        let account = self.find_account(email)?.ok_or(Error::InvalidCredential)?;
        if !self.password_matches(&account.password_hash, password) {
            return Err(Error::InvalidCredential);
        }
        Ok(account.id)
    }

    #[instrument(skip(self, password))]
    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let account_id = self.check_credentials(email, password)?;

        let now = self.clock.now();
        let session = Session::new(
            generate_token(),
            account_id,
            now,
            self.settings.session_ttl(),
        );

        let db = lock(&self.db)?;
        db.accounts().create_session(&session)?;
        db.accounts().update_last_login(account_id, now)?;

        info!(account_id = %account_id, "Signed in");
        Ok(session)
    }

    fn verify_credential(&self, bearer: &str) -> Result<Uuid> {
        if bearer.is_empty() {
            return Err(Error::Unauthenticated);
        }

        let db = lock(&self.db)?;
        let session = db
            .accounts()
            .find_session(bearer)?
            .ok_or(Error::Unauthenticated)?;

        if !session.is_valid_at(self.clock.now()) {
            db.accounts().delete_session(bearer)?;
            debug!(account_id = %session.account_id, "Expired session removed");
            return Err(Error::Unauthenticated);
        }

        Ok(session.account_id)
    }

    fn sign_out(&self, bearer: &str) -> Result<()> {
        let db = lock(&self.db)?;
        db.accounts().delete_session(bearer)
    }
}

#[cfg(test)]
pub(crate) fn fast_argon2() -> Argon2<'static> {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(1024, 1, 1, None).expect("valid argon2 params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}
