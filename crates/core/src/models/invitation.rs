//! Invitation model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;
use crate::error::{Error, Result};

/// A single-use, time-boxed invitation to join a company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub id: Uuid,
    pub token: String,
    pub email: String,
    pub invitee_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<Uuid>,
}

/// Lifecycle state; `Expired` is derived from the clock, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Pending,
    Used,
    Expired,
}

impl Invitation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token: String,
        email: String,
        invitee_name: String,
        role: Role,
        company_id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            email,
            invitee_name,
            phone_number: None,
            role,
            company_id,
            created_by,
            created_at: now,
            expires_at: now + ttl,
            used: false,
            used_at: None,
            used_by: None,
        }
    }

    pub fn with_phone_number(mut self, phone_number: Option<String>) -> Self {
        self.phone_number = phone_number;
        self
    }

    /// State at `now`. Expiry wins over use.
    pub fn state_at(&self, now: DateTime<Utc>) -> InvitationState {
        if now >= self.expires_at {
            InvitationState::Expired
        } else if self.used {
            InvitationState::Used
        } else {
            InvitationState::Pending
        }
    }

    /// Fails with the matching conflict error unless the invitation is pending
    pub fn ensure_redeemable(&self, now: DateTime<Utc>) -> Result<()> {
        match self.state_at(now) {
            InvitationState::Pending => Ok(()),
            InvitationState::Used => Err(Error::InviteUsed),
            InvitationState::Expired => Err(Error::InviteExpired),
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> InvitationSummary {
        InvitationSummary {
            id: self.id,
            email: self.email.clone(),
            invitee_name: self.invitee_name.clone(),
            role: self.role,
            state: self.state_at(now),
            created_by: self.created_by,
            created_at: self.created_at,
            expires_at: self.expires_at,
            used_at: self.used_at,
        }
    }
}

/// Invitation listing entry; never carries the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationSummary {
    pub id: Uuid,
    pub email: String,
    pub invitee_name: String,
    pub role: Role,
    pub state: InvitationState,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}
