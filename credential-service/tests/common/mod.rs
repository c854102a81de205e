//! Test helpers for credential-service integration tests.
//!
//! Runs the full router against the in-memory store and mock session
//! backend, so tests exercise real middleware, extractors, and handlers
//! without external infrastructure.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use base64::Engine;
use credential_service::{
    build_router,
    config::{
        CredentialConfig, EncryptionConfig, Environment, MongoConfig, RedisConfig, SecurityConfig,
        SessionConfig,
    },
    models::Organization,
    services::{InMemoryStore, MockSessionBackend, SecretCipher, Store},
    AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

pub const COOKIE_NAME: &str = "session_id";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    /// Spawn the application with the given organizations pre-seeded.
    pub async fn spawn(orgs: &[Organization]) -> Self {
        let store = Arc::new(InMemoryStore::new());
        for org in orgs {
            store
                .insert_organization(org)
                .await
                .expect("Failed to seed organization");
        }

        let cipher = SecretCipher::from_base64(&test_encryption_key())
            .expect("Failed to build test cipher");
        let state = AppState::new(
            test_config(),
            store.clone(),
            Arc::new(MockSessionBackend::new()),
            cipher,
        );
        let router = build_router(state.clone()).expect("Failed to build router");

        Self {
            router,
            state,
            store,
        }
    }

    /// Send a request through the full middleware stack.
    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("Request failed")
    }

    /// Login as `subject` and return the session cookie value, if any.
    pub async fn login(&self, subject: &str, email: &str, body: Value) -> (StatusCode, Value, Option<String>) {
        let response = self
            .request(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/users/login")
                    .header("x-user-sub", subject)
                    .header("x-user-email", email)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;

        let cookie = session_cookie(&response);
        let status = response.status();
        let json = body_json(response).await;
        (status, json, cookie)
    }
}

pub fn test_config() -> CredentialConfig {
    CredentialConfig {
        environment: Environment::Dev,
        service_name: "credential-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        port: 8080,
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "unused".to_string(),
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        session: SessionConfig {
            cookie_name: COOKIE_NAME.to_string(),
            idle_timeout_minutes: 30,
        },
        encryption: EncryptionConfig {
            key: test_encryption_key(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub fn test_encryption_key() -> String {
    base64::engine::general_purpose::STANDARD.encode([9u8; 32])
}

pub fn test_org(name: &str) -> Organization {
    Organization::new(
        name.to_string(),
        format!("VAT-{}", name),
        format!("SAP-{}", name),
    )
}

/// Extract the session token from a Set-Cookie header, if present.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
        .and_then(|v| v.split(';').next())
        .and_then(|kv| kv.split('=').nth(1))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not valid JSON")
    }
}

/// Request builder with the session cookie attached.
pub fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("{}={}", COOKIE_NAME, token))
}
