//! Invitation storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_datetime_opt, parse_uuid, parse_uuid_opt, role_from_u8, OptionalExt,
};
use crate::error::Result;
use crate::models::Invitation;

const INVITATION_COLUMNS: &str = "id, token, email, invitee_name, phone_number, role, company_id, \
     created_by, created_at, expires_at, used, used_at, used_by";

pub struct InvitationStore<'a> {
    conn: &'a Connection,
}

fn invitation_from_row(row: &Row<'_>) -> rusqlite::Result<Invitation> {
    Ok(Invitation {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        token: row.get(1)?,
        email: row.get(2)?,
        invitee_name: row.get(3)?,
        phone_number: row.get(4)?,
        role: role_from_u8(row.get::<_, u8>(5)?),
        company_id: parse_uuid(&row.get::<_, String>(6)?)?,
        created_by: parse_uuid(&row.get::<_, String>(7)?)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?)?,
        expires_at: parse_datetime(&row.get::<_, String>(9)?)?,
        used: row.get::<_, i32>(10)? != 0,
        used_at: parse_datetime_opt(row.get::<_, Option<String>>(11)?)?,
        used_by: parse_uuid_opt(row.get::<_, Option<String>>(12)?)?,
    })
}

impl<'a> InvitationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, invitation), fields(invite_id = %invitation.id, company_id = %invitation.company_id))]
    pub fn create(&self, invitation: &Invitation) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO invitations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                INVITATION_COLUMNS
            ),
            params![
                invitation.id.to_string(),
                invitation.token,
                invitation.email,
                invitation.invitee_name,
                invitation.phone_number,
                invitation.role as u8,
                invitation.company_id.to_string(),
                invitation.created_by.to_string(),
                invitation.created_at.to_rfc3339(),
                invitation.expires_at.to_rfc3339(),
                invitation.used as i32,
                invitation.used_at.map(|t| t.to_rfc3339()),
                invitation.used_by.map(|id| id.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Find invitation by token
    pub fn find_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        let invitation = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM invitations WHERE token = ?1",
                    INVITATION_COLUMNS
                ),
                params![token],
                invitation_from_row,
            )
            .optional()?;

        Ok(invitation)
    }

    /// List invitations for a company, newest first
    pub fn list_for_company(&self, company_id: Uuid) -> Result<Vec<Invitation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM invitations WHERE company_id = ?1 ORDER BY created_at DESC",
            INVITATION_COLUMNS
        ))?;

        let invitations = stmt
            .query_map(params![company_id.to_string()], invitation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(invitations)
    }

    /// Mark an invitation used, only if it is still unused.
    ///
    /// Returns false when the write did not apply: the token is unknown or
    /// another redemption already consumed it.
    #[instrument(skip(self, token))]
    pub fn consume(&self, token: &str, account_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE invitations SET used = 1, used_at = ?1, used_by = ?2
             WHERE token = ?3 AND used = 0",
            params![now.to_rfc3339(), account_id.to_string(), token],
        )?;
        Ok(updated == 1)
    }
}
