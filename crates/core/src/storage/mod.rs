//! SQLite storage layer for FleetFlow

mod accounts;
mod companies;
mod invitations;
mod migrations;
mod parse;
mod profiles;
mod traits;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Company, Invitation, Profile, ProfileStatus, Role};

pub use accounts::AccountStore;
pub use companies::CompanyStore;
pub use invitations::InvitationStore;
pub use profiles::ProfileStore;
pub use traits::{CompanyRepository, InvitationRepository, ProfileRepository, Storage};

/// Database handle shared by the backend and the local identity provider
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Lock a shared database, reporting a poisoned lock as an upstream failure
pub fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| Error::Upstream("database lock poisoned".into()))
}

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_current_version(&self.conn)
    }

    pub fn companies(&self) -> CompanyStore<'_> {
        CompanyStore::new(&self.conn)
    }

    pub fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(&self.conn)
    }

    pub fn invitations(&self) -> InvitationStore<'_> {
        InvitationStore::new(&self.conn)
    }

    /// Identity-side store, used by the local identity provider
    pub fn accounts(&self) -> AccountStore<'_> {
        AccountStore::new(&self.conn)
    }

    /// Run raw SQL against the connection
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Wrap in a shared handle
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl CompanyRepository for Database {
    fn create_company(&self, company: &Company) -> Result<()> {
        self.companies().create(company)
    }

    fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        self.companies().find_by_id(id)
    }
}

impl ProfileRepository for Database {
    fn create_profile(&self, profile: &Profile) -> Result<bool> {
        self.profiles().create(profile)
    }

    fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        self.profiles().find_by_id(id)
    }

    fn list_profiles_for_company(
        &self,
        company_id: Uuid,
        role: Option<Role>,
    ) -> Result<Vec<Profile>> {
        self.profiles().list_for_company(company_id, role)
    }

    fn update_profile_status(
        &self,
        id: Uuid,
        status: ProfileStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.profiles().update_status(id, status, now)
    }

    fn delete_profile(&self, id: Uuid) -> Result<bool> {
        self.profiles().delete(id)
    }
}

impl InvitationRepository for Database {
    fn create_invitation(&self, invitation: &Invitation) -> Result<()> {
        self.invitations().create(invitation)
    }

    fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        self.invitations().find_by_token(token)
    }

    fn list_invitations_for_company(&self, company_id: Uuid) -> Result<Vec<Invitation>> {
        self.invitations().list_for_company(company_id)
    }

    fn consume_invitation(
        &self,
        token: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.invitations().consume(token, account_id, now)
    }
}
