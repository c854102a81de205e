//! Login and user directory handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::dtos::auth::{LoginRequest, LoginResponse, UserDto};
use crate::error::{AppError, ResourceKind};
use crate::middleware::RequestContext;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Run a login for the identity asserted by the upstream proxy.
///
/// POST /api/v1/users/login
///
/// When a session is created the token is set as an HTTP-only cookie and
/// echoed in the body for non-browser clients.
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let outcome = state.login_service.login(&ctx, request).await?;

    let jar = match &outcome.session_token {
        Some(token) => jar.add(session_cookie(
            &state.config.session.cookie_name,
            token.clone(),
        )),
        None => jar,
    };

    Ok((jar, Json(outcome.response)))
}

/// List all users.
///
/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    _ctx: RequestContext,
) -> Result<Json<Vec<UserDto>>, AppError> {
    let users = state
        .store
        .find_all_users()
        .await
        .map_err(AppError::Database)?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

/// Fetch a single user by id.
///
/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .store
        .find_user_by_id(id)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound {
            kind: ResourceKind::User,
            id: id.to_string(),
        })?;
    Ok(Json(UserDto::from(user)))
}

fn session_cookie(name: &str, token: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired cookie that clears the session on the client.
pub(crate) fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), String::new()))
        .path("/")
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}
