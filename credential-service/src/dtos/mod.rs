pub mod auth;
pub mod credential;

pub use auth::{LoginRequest, LoginResponse, OrgSelectionRequest, OrganizationDto, SessionView, UserDto};
pub use credential::{CreateCredentialRequest, CredentialResponse};
