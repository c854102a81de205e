//! Credential model - a client-id/secret pair scoped to one organization
//! and owned by its creating user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential entity.
///
/// `client_secret` holds the encrypted blob only; plaintext is never
/// persisted or logged. Secret reset swaps the ciphertext in place and
/// leaves every other field unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub client_id: String,
    pub client_secret: String,
    pub name: String,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        client_id: String,
        encrypted_secret: String,
        name: String,
        organization_id: Uuid,
        created_by: Uuid,
        validity_days: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            client_secret: encrypted_secret,
            name,
            organization_id,
            created_by,
            created_at: now,
            expires_at: now + Duration::days(validity_days),
        }
    }
}
