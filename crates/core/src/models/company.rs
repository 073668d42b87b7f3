//! Company (tenant) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A company: the isolation boundary for profiles and invitations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: now,
        }
    }
}
