//! Profile and role models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Company roles in privilege order (lowest to highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    Driver = 1,
    Manager = 2,
    Admin = 3,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(Role::Driver),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Validation(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Active,
    Inactive,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Active => "active",
            ProfileStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProfileStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProfileStatus::Active),
            "inactive" => Ok(ProfileStatus::Inactive),
            other => Err(Error::Validation(format!("unknown status '{}'", other))),
        }
    }
}

/// Company-scoped profile, keyed by the identity account id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub company_id: Uuid,
    pub status: ProfileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(
        account_id: Uuid,
        email: String,
        display_name: String,
        role: Role,
        company_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: account_id,
            email,
            display_name,
            role,
            company_id,
            status: ProfileStatus::Active,
            phone_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone_number(mut self, phone_number: Option<String>) -> Self {
        self.phone_number = phone_number;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ProfileStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Driver);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_profile_is_active() {
        let profile = Profile::new(
            Uuid::new_v4(),
            "jane@x.com".into(),
            "Jane".into(),
            Role::Manager,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(profile.is_active());
        assert!(profile.phone_number.is_none());
    }
}
