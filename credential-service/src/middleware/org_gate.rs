//! Organization membership gate.
//!
//! Runs on every credential route, after context resolution. Re-validates
//! membership against live storage rather than the session snapshot, so a
//! membership revoked mid-session is caught here.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::middleware::RequestContext;
use crate::AppState;

pub async fn org_gate_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .ok_or_else(|| {
            AppError::LoginRequired("Operation not allowed. Please login first.".to_string())
        })?;

    match ctx.selected_org_id {
        Some(org_id) => {
            let is_member = state
                .store
                .is_member_of_org(&ctx.subject_id, org_id)
                .await
                .map_err(AppError::Database)?;
            if !is_member {
                return Err(AppError::NotPermitted(format!(
                    "User with subject ID: {} is not a member of organization with ID: {}",
                    ctx.subject_id, org_id
                )));
            }
        }
        None => {
            let user = state
                .store
                .find_user_by_subject_id(&ctx.subject_id)
                .await
                .map_err(AppError::Database)?;
            if let Some(user) = user {
                if user.organization_ids.len() > 1 {
                    return Err(AppError::OrgSelectionRequired(
                        "Organization selection required. Please call POST /api/v1/session/org first."
                            .to_string(),
                    ));
                }
            }
        }
    }

    Ok(next.run(req).await)
}
