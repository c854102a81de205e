//! User model - identity records keyed by an upstream-verified subject id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User entity. Created on first successful login; never deleted here.
///
/// `subject_id` is the stable identifier established by upstream identity
/// verification and is immutable once the row exists. `organization_ids`
/// holds the user's memberships (many-to-many with Organization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub subject_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_ids: Vec<Uuid>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        subject_id: String,
        email: String,
        first_name: Option<String>,
        last_name: Option<String>,
        organization_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            email,
            first_name,
            last_name,
            organization_ids,
            created_at: Utc::now(),
        }
    }

    pub fn is_member_of(&self, org_id: Uuid) -> bool {
        self.organization_ids.contains(&org_id)
    }
}
