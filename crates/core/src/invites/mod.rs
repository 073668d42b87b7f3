//! Invitation and account-provisioning flow
//!
//! - issuer: authorized callers create invitations
//! - resolver: read-only preview of a pending invitation
//! - redeemer: consume an invitation into an identity account and profile

mod issuer;
mod redeemer;
mod resolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Company, Profile, Role};

pub use redeemer::RedemptionStep;

/// Invite issuance request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInviteRequest {
    pub invitee_name: String,
    pub invitee_email: String,
    pub company_id: Uuid,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Returned to the issuer; the token is delivered to the invitee out-of-band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvite {
    pub invite_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Redacted view of a pending invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePreview {
    pub email: String,
    pub role: Role,
    pub company_id: Uuid,
    pub company_name: String,
}

/// Invite redemption request.
///
/// Role and company are deliberately absent: they always come from the
/// stored invitation, and any such fields sent by a client are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemInviteRequest {
    pub token: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Minimal summary of a provisioned account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    #[serde(rename = "id")]
    pub account_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub company_id: Uuid,
    pub company_name: String,
}

impl AccountSummary {
    pub fn new(profile: &Profile, company: &Company) -> Self {
        Self {
            account_id: profile.id,
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            role: profile.role,
            company_id: company.id,
            company_name: company.name.clone(),
        }
    }
}

/// Trimmed value of a required text field
pub(crate) fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Trimmed email with a non-empty local part and domain
pub(crate) fn validate_email(value: &str) -> Result<&str> {
    let email = require("email", value)?;
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(Error::Validation(format!("'{}' is not a valid email", email)));
    }
    Ok(email)
}

/// Trimmed optional field; blank counts as absent
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
