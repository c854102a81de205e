//! Session state stored in the session backend, keyed by an opaque token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-login-session state.
///
/// `associated_org_ids` is a snapshot of the user's memberships taken at
/// session creation; live membership is re-validated by the organization
/// gate on every protected request. `org_selection_required` is true iff
/// no organization is selected, whether there are several candidates or
/// none at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub subject_id: String,
    pub email: String,
    pub selected_org_id: Option<Uuid>,
    pub selected_org_name: Option<String>,
    pub associated_org_ids: Vec<Uuid>,
    pub org_selection_required: bool,
}
