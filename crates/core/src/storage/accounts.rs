//! Account and session storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Account, Session};

pub struct AccountStore<'a> {
    conn: &'a Connection,
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
        last_login: parse_datetime_opt(row.get::<_, Option<String>>(5)?)?,
    })
}

impl<'a> AccountStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an account; returns false if the email is already registered
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    pub fn create(&self, account: &Account) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO accounts (id, email, display_name, password_hash, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(email) DO NOTHING",
            params![
                account.id.to_string(),
                account.email,
                account.display_name,
                account.password_hash,
                account.created_at.to_rfc3339(),
                account.last_login.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT id, email, display_name, password_hash, created_at, last_login
                 FROM accounts WHERE email = ?1",
                params![email],
                account_from_row,
            )
            .optional()?;

        Ok(account)
    }

    pub fn update_last_login(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET last_login = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), account_id.to_string()],
        )?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(account_id = %session.account_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (token, account_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.account_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find a session by bearer token, expired or not
    pub fn find_session(&self, token: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT token, account_id, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        account_id: parse_uuid(&row.get::<_, String>(1)?)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                        expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;

        Ok(session)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }
}
