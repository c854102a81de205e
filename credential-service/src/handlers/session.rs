//! Session inspection, organization selection, and logout.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::dtos::auth::{OrgSelectionRequest, SessionView};
use crate::error::AppError;
use crate::handlers::user::removal_cookie;
use crate::middleware::RequestContext;
use crate::AppState;

/// Current session view, or 204 when no live session exists.
///
/// GET /api/v1/session
pub async fn get_session(
    State(state): State<AppState>,
    ctx: Option<RequestContext>,
) -> Result<Response, AppError> {
    let token = ctx.and_then(|c| c.session_token);
    let Some(token) = token else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    match state.sessions.get(&token).await? {
        Some(session) => Ok(Json(SessionView::from(session)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Bind the session to one of the caller's organizations.
///
/// POST /api/v1/session/org
pub async fn select_organization(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<OrgSelectionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let token = ctx.session_token.ok_or_else(|| {
        AppError::LoginRequired("No active session. Please login first.".to_string())
    })?;

    let session = state
        .sessions
        .select_organization(&token, request.organization_id)
        .await?;

    Ok(Json(SessionView::from(session)))
}

/// Logout: invalidate the session and expire the cookie.
///
/// DELETE /api/v1/session
pub async fn logout(
    State(state): State<AppState>,
    ctx: Option<RequestContext>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    if let Some(token) = ctx.and_then(|c| c.session_token) {
        state.sessions.invalidate(&token).await?;
    }
    let jar = jar.add(removal_cookie(&state.config.session.cookie_name));
    Ok((jar, StatusCode::NO_CONTENT))
}
