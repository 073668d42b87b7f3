//! Company storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Company;

pub struct CompanyStore<'a> {
    conn: &'a Connection,
}

impl<'a> CompanyStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, company), fields(company_id = %company.id))]
    pub fn create(&self, company: &Company) -> Result<()> {
        self.conn.execute(
            "INSERT INTO companies (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                company.id.to_string(),
                company.name,
                company.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        let company = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM companies WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Company {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        name: row.get(1)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    })
                },
            )
            .optional()?;

        Ok(company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::Utc;

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let company = Company::new("Acme Haulage".into(), Utc::now());
        db.companies().create(&company).unwrap();

        let found = db.companies().find_by_id(company.id).unwrap().unwrap();
        assert_eq!(found.name, "Acme Haulage");
        assert!(db.companies().find_by_id(Uuid::new_v4()).unwrap().is_none());
    }
}
