use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCredentialRequest {
    #[validate(length(min = 1, message = "Credential name cannot be blank"))]
    pub name: String,
    #[validate(range(min = 1, max = 90, message = "Validity must be between 1 and 90 days"))]
    pub validity_days: i64,
}

/// Credential as returned to the caller. `client_secret` is plaintext only
/// on create and reset-secret (one-time reveal); every other read returns
/// it masked.
#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub id: Uuid,
    pub client_id: String,
    pub client_secret: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
