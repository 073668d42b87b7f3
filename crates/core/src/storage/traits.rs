//! Storage repository traits
//!
//! The document-store interface the backend depends on. `Database`
//! implements all of them over SQLite; tests may substitute their own.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Company, Invitation, Profile, ProfileStatus, Role};

/// Company repository operations
pub trait CompanyRepository {
    fn create_company(&self, company: &Company) -> Result<()>;

    fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>>;
}

/// Profile repository operations
pub trait ProfileRepository {
    /// Returns false if the account already has a profile
    fn create_profile(&self, profile: &Profile) -> Result<bool>;

    /// Find profile by account id
    fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>>;

    /// List a company's profiles, optionally restricted to one role
    fn list_profiles_for_company(&self, company_id: Uuid, role: Option<Role>)
        -> Result<Vec<Profile>>;

    /// Returns false if the profile does not exist
    fn update_profile_status(
        &self,
        id: Uuid,
        status: ProfileStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Returns false if the profile does not exist
    fn delete_profile(&self, id: Uuid) -> Result<bool>;
}

/// Invitation repository operations
pub trait InvitationRepository {
    fn create_invitation(&self, invitation: &Invitation) -> Result<()>;

    fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>>;

    fn list_invitations_for_company(&self, company_id: Uuid) -> Result<Vec<Invitation>>;

    /// Conditional write: marks the invitation used only if it is still
    /// unused. Returns whether the write applied.
    fn consume_invitation(&self, token: &str, account_id: Uuid, now: DateTime<Utc>)
        -> Result<bool>;
}

/// Combined document-store interface
pub trait Storage: CompanyRepository + ProfileRepository + InvitationRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: CompanyRepository + ProfileRepository + InvitationRepository {}
