pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::CredentialConfig;
use crate::error::AppError;
use crate::middleware::{org_gate_middleware, request_context_middleware};
use crate::services::{
    CredentialService, LoginService, SecretCipher, SessionBackend, SessionService, Store,
};

#[derive(Clone)]
pub struct AppState {
    pub config: CredentialConfig,
    pub store: Arc<dyn Store>,
    pub sessions: SessionService,
    pub login_service: LoginService,
    pub credential_service: CredentialService,
}

impl AppState {
    pub fn new(
        config: CredentialConfig,
        store: Arc<dyn Store>,
        session_backend: Arc<dyn SessionBackend>,
        cipher: SecretCipher,
    ) -> Self {
        let sessions = SessionService::new(
            session_backend,
            store.clone(),
            config.session_ttl_seconds(),
        );
        let login_service = LoginService::new(store.clone(), sessions.clone());
        let credential_service = CredentialService::new(store.clone(), cipher);
        Self {
            config,
            store,
            sessions,
            login_service,
            credential_service,
        }
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Credential routes sit behind the organization gate; everything under
    // /api/v1 gets the request context resolved first.
    let credential_routes = Router::new()
        .route("/credentials", post(handlers::credential::create_credential))
        .route(
            "/credentials/:id",
            get(handlers::credential::get_credential)
                .delete(handlers::credential::delete_credential),
        )
        .route(
            "/credentials/:id/reset-secret",
            patch(handlers::credential::reset_credential_secret),
        )
        .layer(from_fn_with_state(state.clone(), org_gate_middleware));

    let api = Router::new()
        .route("/users/login", post(handlers::user::login))
        .route("/users", get(handlers::user::list_users))
        .route("/users/:id", get(handlers::user::get_user))
        .route(
            "/session",
            get(handlers::session::get_session).delete(handlers::session::logout),
        )
        .route("/session/org", post(handlers::session::select_organization))
        .merge(credential_routes)
        .layer(from_fn_with_state(
            state.clone(),
            request_context_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::error!(origin = %o, error = %e, "Invalid CORS origin, skipping");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE]);

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors);

    Ok(app)
}

/// Service health check.
///
/// GET /health
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "MongoDB health check failed");
        AppError::Database(e)
    })?;

    state.sessions.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::Cache(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "mongodb": "up",
            "redis": "up"
        }
    })))
}
