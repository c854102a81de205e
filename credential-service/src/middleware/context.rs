//! Per-request identity context resolution.
//!
//! The resolved context travels in the request extensions, which are built
//! and dropped with each request — the explicit replacement for ambient
//! thread-local state, so identity can never leak into a subsequent request
//! handled by the same worker.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Identity resolved for the current request.
///
/// Built from session state when a live session token is presented
/// (authoritative for protected operations), or from trusted upstream
/// headers on the login path.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub subject_id: String,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub selected_org_id: Option<Uuid>,
    pub org_selection_required: bool,
    /// Present only when the context was resolved from a session.
    pub session_token: Option<String>,
}

impl RequestContext {
    /// Minimal context from upstream-verified headers (pre-session).
    pub fn from_headers(subject_id: String, email: String) -> Self {
        Self {
            subject_id,
            email,
            user_id: None,
            selected_org_id: None,
            org_selection_required: false,
            session_token: None,
        }
    }
}

/// Resolve the acting identity: session first, trusted headers second,
/// otherwise no context.
pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());

    let mut context = None;

    if let Some(cookie) = jar.get(&state.config.session.cookie_name) {
        let token = cookie.value().to_string();
        if let Some(session) = state.sessions.get(&token).await? {
            context = Some(RequestContext {
                subject_id: session.subject_id,
                email: session.email,
                user_id: Some(session.user_id),
                selected_org_id: session.selected_org_id,
                org_selection_required: session.org_selection_required,
                session_token: Some(token),
            });
        }
    }

    // Headers are only honored pre-session; the upstream proxy has already
    // verified them on the login path.
    if context.is_none() {
        let subject = req
            .headers()
            .get("x-user-sub")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.trim().is_empty());
        if let Some(subject_id) = subject {
            let email = req
                .headers()
                .get("x-user-email")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            context = Some(RequestContext::from_headers(
                subject_id.to_string(),
                email.to_string(),
            ));
        }
    }

    if let Some(ctx) = context {
        tracing::debug!(subject_id = %ctx.subject_id, selected_org_id = ?ctx.selected_org_id, "Request context resolved");
        req.extensions_mut().insert(ctx);
    }

    Ok(next.run(req).await)
}

/// Extractor for handlers that require an authenticated context.
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| {
                AppError::LoginRequired("Authentication required. Please login first.".to_string())
            })
    }
}
