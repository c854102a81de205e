//! HTTP handlers for credential-service.

pub mod credential;
pub mod session;
pub mod user;
