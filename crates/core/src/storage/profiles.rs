//! Profile storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_status, parse_uuid, role_from_u8, OptionalExt};
use crate::error::Result;
use crate::models::{Profile, ProfileStatus, Role};

const PROFILE_COLUMNS: &str =
    "id, email, display_name, role, company_id, status, phone_number, created_at, updated_at";

pub struct ProfileStore<'a> {
    conn: &'a Connection,
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: role_from_u8(row.get::<_, u8>(3)?),
        company_id: parse_uuid(&row.get::<_, String>(4)?)?,
        status: parse_status(&row.get::<_, String>(5)?)?,
        phone_number: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

impl<'a> ProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a profile; returns false if the account already has one
    #[instrument(skip(self, profile), fields(profile_id = %profile.id, company_id = %profile.company_id))]
    pub fn create(&self, profile: &Profile) -> Result<bool> {
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO profiles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO NOTHING",
                PROFILE_COLUMNS
            ),
            params![
                profile.id.to_string(),
                profile.email,
                profile.display_name,
                profile.role as u8,
                profile.company_id.to_string(),
                profile.status.as_str(),
                profile.phone_number,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
                params![id.to_string()],
                profile_from_row,
            )
            .optional()?;

        Ok(profile)
    }

    /// List profiles in a company, oldest first, optionally filtered by role
    pub fn list_for_company(&self, company_id: Uuid, role: Option<Role>) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM profiles
             WHERE company_id = ?1 AND (?2 IS NULL OR role = ?2)
             ORDER BY created_at ASC",
            PROFILE_COLUMNS
        ))?;

        let profiles = stmt
            .query_map(
                params![company_id.to_string(), role.map(|r| r as u8)],
                profile_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    /// Update status; returns false if no such profile
    pub fn update_status(
        &self,
        id: Uuid,
        status: ProfileStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE profiles SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now.to_rfc3339(), id.to_string()],
        )?;
        Ok(updated == 1)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM profiles WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use crate::storage::Database;

    fn seed(db: &Database) -> Company {
        let company = Company::new("Acme".into(), Utc::now());
        db.companies().create(&company).unwrap();
        company
    }

    #[test]
    fn test_create_find_and_filter() {
        let db = Database::open_in_memory().unwrap();
        let company = seed(&db);
        let now = Utc::now();

        let manager = Profile::new(
            Uuid::new_v4(),
            "m@x.com".into(),
            "M".into(),
            Role::Manager,
            company.id,
            now,
        );
        let driver = Profile::new(
            Uuid::new_v4(),
            "d@x.com".into(),
            "D".into(),
            Role::Driver,
            company.id,
            now + chrono::Duration::seconds(1),
        )
        .with_phone_number(Some("+15550100".into()));

        assert!(db.profiles().create(&manager).unwrap());
        assert!(db.profiles().create(&driver).unwrap());

        let mut duplicate = driver.clone();
        duplicate.role = Role::Manager;
        assert!(!db.profiles().create(&duplicate).unwrap());

        let found = db.profiles().find_by_id(driver.id).unwrap().unwrap();
        assert_eq!(found, driver);

        let all = db.profiles().list_for_company(company.id, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, manager.id);

        let drivers = db
            .profiles()
            .list_for_company(company.id, Some(Role::Driver))
            .unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].id, driver.id);
    }

    #[test]
    fn test_update_status() {
        let db = Database::open_in_memory().unwrap();
        let company = seed(&db);
        let profile = Profile::new(
            Uuid::new_v4(),
            "d@x.com".into(),
            "D".into(),
            Role::Driver,
            company.id,
            Utc::now(),
        );
        db.profiles().create(&profile).unwrap();

        assert!(db
            .profiles()
            .update_status(profile.id, ProfileStatus::Inactive, Utc::now())
            .unwrap());
        let found = db.profiles().find_by_id(profile.id).unwrap().unwrap();
        assert_eq!(found.status, ProfileStatus::Inactive);

        assert!(!db
            .profiles()
            .update_status(Uuid::new_v4(), ProfileStatus::Active, Utc::now())
            .unwrap());

        assert!(db.profiles().delete(profile.id).unwrap());
        assert!(db.profiles().find_by_id(profile.id).unwrap().is_none());
        assert!(!db.profiles().delete(profile.id).unwrap());
    }
}
