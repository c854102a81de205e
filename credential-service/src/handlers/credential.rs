//! Credential lifecycle handlers.
//!
//! All routes here sit behind the organization gate, so the context always
//! carries an authenticated subject; the service layer still re-checks
//! ownership and org scope per operation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::dtos::credential::{CreateCredentialRequest, CredentialResponse};
use crate::error::AppError;
use crate::middleware::RequestContext;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Issue a credential for the selected organization.
///
/// POST /api/v1/credentials
pub async fn create_credential(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(request): ValidatedJson<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<CredentialResponse>), AppError> {
    let response = state.credential_service.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch a credential; the secret is masked.
///
/// GET /api/v1/credentials/:id
pub async fn get_credential(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CredentialResponse>, AppError> {
    let response = state.credential_service.get_by_id(&ctx, id).await?;
    Ok(Json(response))
}

/// Rotate the secret in place and reveal the new value once.
///
/// PATCH /api/v1/credentials/:id/reset-secret
pub async fn reset_credential_secret(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CredentialResponse>, AppError> {
    let response = state.credential_service.reset_secret(&ctx, id).await?;
    Ok(Json(response))
}

/// Delete a credential.
///
/// DELETE /api/v1/credentials/:id
pub async fn delete_credential(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.credential_service.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
