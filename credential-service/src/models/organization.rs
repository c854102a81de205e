//! Organization model - the tenant boundary owning credentials.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organization entity. Pre-provisioned externally; read-only from this
/// service's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub vat_number: String,
    pub sap_id: String,
}

impl Organization {
    pub fn new(name: String, vat_number: String, sap_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            vat_number,
            sap_id,
        }
    }
}
