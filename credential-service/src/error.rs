use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Resource kinds that can fail to resolve, used to build not-found codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Organization,
    Credential,
}

impl ResourceKind {
    pub fn code(&self) -> &'static str {
        match self {
            ResourceKind::User => "USER_NOT_FOUND",
            ResourceKind::Organization => "ORGANIZATION_NOT_FOUND",
            ResourceKind::Credential => "CREDENTIAL_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::User => write!(f, "User"),
            ResourceKind::Organization => write!(f, "Organization"),
            ResourceKind::Credential => write!(f, "Credential"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{0}")]
    LoginRequired(String),

    #[error("{0}")]
    OrgSelectionRequired(String),

    #[error("{0}")]
    NotPermitted(String),

    // Detail is logged at the site of failure; callers only see a generic message.
    #[error("Credential processing failed")]
    Codec,

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Session store error: {0}")]
    Cache(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Database(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// Structured error body returned for every failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::Validation(errs) => {
                let mut details = HashMap::new();
                for (field, errors) in errs.field_errors() {
                    let msg = errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    details.insert(field.to_string(), msg);
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    "Input validation failed".to_string(),
                    Some(details),
                )
            }
            AppError::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg, None)
            }
            AppError::NotFound { kind, ref id } => (
                StatusCode::NOT_FOUND,
                kind.code(),
                format!("{} not found: {}", kind, id),
                None,
            ),
            AppError::LoginRequired(msg) => (StatusCode::UNAUTHORIZED, "LOGIN_REQUIRED", msg, None),
            AppError::OrgSelectionRequired(msg) => (
                StatusCode::FORBIDDEN,
                "ORG_SELECTION_REQUIRED",
                msg,
                None,
            ),
            AppError::NotPermitted(msg) => (StatusCode::FORBIDDEN, "NOT_PERMITTED", msg, None),
            AppError::Codec => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CREDENTIAL_ERROR",
                "Credential processing failed".to_string(),
                None,
            ),
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Cache(err) => {
                tracing::error!(error = %err, "Session store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CACHE_ERROR",
                    "Session store error".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Config(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "Configuration error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            code: code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}
