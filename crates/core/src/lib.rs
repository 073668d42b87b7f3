//! FleetFlow Core Library
//!
//! Models, storage, identity, authorization and the invitation flow that
//! provisions new company members.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod invites;
pub mod members;
pub mod models;
pub mod permissions;
pub mod storage;
pub mod token;

pub use backend::Backend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FleetConfig;
pub use error::{Error, ErrorKind, Result};
pub use identity::{IdentityProvider, LocalIdentity};
pub use invites::{
    AccountSummary, InvitePreview, IssueInviteRequest, IssuedInvite, RedeemInviteRequest,
    RedemptionStep,
};
pub use models::*;
pub use permissions::*;
pub use storage::{
    CompanyRepository, Database, InvitationRepository, ProfileRepository, SharedDatabase, Storage,
};
