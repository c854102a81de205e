use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Organization, SessionData, User};

/// Login request body.
///
/// `associate_with_org_ids` is honored only on first login — it establishes
/// the user's memberships once. It is NOT session organization selection;
/// that goes through `POST /api/v1/session/org`. Returning users supplying
/// it are logged and the field is ignored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub associate_with_org_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub first_login: bool,
    pub requires_org_selection: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Candidates to choose from (first login, or returning multi-org user).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_orgs: Option<Vec<OrganizationDto>>,
    /// Organizations already associated with the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_orgs: Option<Vec<OrganizationDto>>,
}

#[derive(Debug, Deserialize)]
pub struct OrgSelectionRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDto {
    pub id: Uuid,
    pub name: String,
    pub vat_number: String,
    pub sap_id: String,
}

impl From<Organization> for OrganizationDto {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            vat_number: org.vat_number,
            sap_id: org.sap_id,
        }
    }
}

/// Session state exposed to the client; never includes the token itself.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user_id: Uuid,
    pub subject_id: String,
    pub email: String,
    pub selected_org_id: Option<Uuid>,
    pub selected_org_name: Option<String>,
    pub associated_org_ids: Vec<Uuid>,
    pub org_selection_required: bool,
}

impl From<SessionData> for SessionView {
    fn from(data: SessionData) -> Self {
        Self {
            user_id: data.user_id,
            subject_id: data.subject_id,
            email: data.email,
            selected_org_id: data.selected_org_id,
            selected_org_name: data.selected_org_name,
            associated_org_ids: data.associated_org_ids,
            org_selection_required: data.org_selection_required,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub subject_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization_ids: Vec<Uuid>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            subject_id: user.subject_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            organization_ids: user.organization_ids,
        }
    }
}
