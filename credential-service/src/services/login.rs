//! Login state machine.
//!
//! Each login call classifies the caller along two axes — new vs. returning
//! subject, and single vs. multiple associated organizations — and produces
//! the next required client action. User rows are created exactly once, on
//! the first login that supplies organization associations.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::auth::{LoginRequest, LoginResponse, OrganizationDto};
use crate::error::AppError;
use crate::middleware::RequestContext;
use crate::models::User;
use crate::services::{SessionService, Store};

/// Outcome of a login call: the response body plus a freshly minted session
/// token when a session was created (the transport turns it into a cookie).
#[derive(Debug)]
pub struct LoginOutcome {
    pub response: LoginResponse,
    pub session_token: Option<String>,
}

#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn Store>,
    sessions: SessionService,
}

impl LoginService {
    pub fn new(store: Arc<dyn Store>, sessions: SessionService) -> Self {
        Self { store, sessions }
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        request: LoginRequest,
    ) -> Result<LoginOutcome, AppError> {
        let existing = self
            .store
            .find_user_by_subject_id(&ctx.subject_id)
            .await
            .map_err(AppError::Database)?;

        match existing {
            None => self.first_time_login(ctx, request).await,
            Some(user) => self.returning_login(user, request).await,
        }
    }

    async fn first_time_login(
        &self,
        ctx: &RequestContext,
        request: LoginRequest,
    ) -> Result<LoginOutcome, AppError> {
        let requested: Vec<Uuid> = request
            .associate_with_org_ids
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // No association supplied: offer all organizations, create nothing.
        if requested.is_empty() {
            let orgs = self
                .store
                .find_all_orgs()
                .await
                .map_err(AppError::Database)?;
            return Ok(LoginOutcome {
                response: LoginResponse {
                    email: ctx.email.clone(),
                    first_login: true,
                    requires_org_selection: true,
                    message: "Please select one or more organizations to associate with your account"
                        .to_string(),
                    session_id: None,
                    available_orgs: Some(orgs.into_iter().map(OrganizationDto::from).collect()),
                    associated_orgs: None,
                },
                session_token: None,
            });
        }

        // Every requested id must resolve, or nothing is created.
        let orgs = self
            .store
            .find_orgs_by_ids(&requested)
            .await
            .map_err(AppError::Database)?;
        if orgs.len() != requested.len() {
            return Err(AppError::InvalidArgument(
                "One or more organization IDs are invalid".to_string(),
            ));
        }

        let org_ids: Vec<Uuid> = orgs.iter().map(|o| o.id).collect();
        let user = User::new(
            ctx.subject_id.clone(),
            ctx.email.clone(),
            request.first_name,
            request.last_name,
            org_ids.clone(),
        );
        self.store
            .insert_user(&user)
            .await
            .map_err(AppError::Database)?;

        tracing::info!(user_id = %user.id, subject_id = %user.subject_id, org_count = org_ids.len(), "User created on first login");

        let (token, session) = self
            .sessions
            .create(user.id, &user.subject_id, &user.email, org_ids)
            .await?;

        let requires_org_selection = session.org_selection_required;
        let message = if requires_org_selection {
            "Account created. Please select an organization for this session via POST /api/v1/session/org"
        } else {
            "Account created and organization set for session"
        };

        Ok(LoginOutcome {
            response: LoginResponse {
                email: ctx.email.clone(),
                first_login: true,
                requires_org_selection,
                message: message.to_string(),
                session_id: Some(token.clone()),
                available_orgs: None,
                associated_orgs: Some(orgs.into_iter().map(OrganizationDto::from).collect()),
            },
            session_token: Some(token),
        })
    }

    async fn returning_login(
        &self,
        user: User,
        request: LoginRequest,
    ) -> Result<LoginOutcome, AppError> {
        // Association is one-time at first login; this is not a mutation path.
        if request
            .associate_with_org_ids
            .as_ref()
            .is_some_and(|ids| !ids.is_empty())
        {
            tracing::warn!(
                subject_id = %user.subject_id,
                "Returning login supplied associate_with_org_ids; ignored"
            );
        }

        let orgs = self
            .store
            .find_orgs_by_ids(&user.organization_ids)
            .await
            .map_err(AppError::Database)?;

        let (token, session) = self
            .sessions
            .create(
                user.id,
                &user.subject_id,
                &user.email,
                user.organization_ids.clone(),
            )
            .await?;

        let org_dtos: Vec<OrganizationDto> = orgs.into_iter().map(OrganizationDto::from).collect();

        let response = if !session.org_selection_required {
            let org_name = session.selected_org_name.as_deref().unwrap_or("");
            LoginResponse {
                email: user.email.clone(),
                first_login: false,
                requires_org_selection: false,
                message: format!(
                    "Welcome back! Organization '{}' set for this session",
                    org_name
                ),
                session_id: Some(token.clone()),
                available_orgs: None,
                associated_orgs: Some(org_dtos),
            }
        } else {
            LoginResponse {
                email: user.email.clone(),
                first_login: false,
                requires_org_selection: true,
                message:
                    "Please select an organization for this session via POST /api/v1/session/org"
                        .to_string(),
                session_id: Some(token.clone()),
                available_orgs: Some(org_dtos),
                associated_orgs: None,
            }
        };

        Ok(LoginOutcome {
            response,
            session_token: Some(token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Organization;
    use crate::services::{InMemoryStore, MockSessionBackend, SessionService};

    struct Fixture {
        store: Arc<InMemoryStore>,
        login: LoginService,
        sessions: SessionService,
    }

    async fn fixture(orgs: &[Organization]) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        for org in orgs {
            store.insert_organization(org).await.unwrap();
        }
        let backend = Arc::new(MockSessionBackend::new());
        let sessions = SessionService::new(backend, store.clone(), 1800);
        let login = LoginService::new(store.clone(), sessions.clone());
        Fixture {
            store,
            login,
            sessions,
        }
    }

    fn header_ctx(subject: &str, email: &str) -> RequestContext {
        RequestContext::from_headers(subject.to_string(), email.to_string())
    }

    fn org(name: &str) -> Organization {
        Organization::new(
            name.to_string(),
            format!("VAT-{}", name),
            format!("SAP-{}", name),
        )
    }

    #[tokio::test]
    async fn new_user_without_orgs_gets_candidates_and_no_user_row() {
        let a = org("A");
        let b = org("B");
        let fx = fixture(&[a, b]).await;

        let outcome = fx
            .login
            .login(&header_ctx("sub-new", "new@example.com"), LoginRequest::default())
            .await
            .unwrap();

        assert!(outcome.response.first_login);
        assert!(outcome.response.requires_org_selection);
        assert!(outcome.session_token.is_none());
        assert_eq!(outcome.response.available_orgs.as_ref().unwrap().len(), 2);
        assert!(fx
            .store
            .find_user_by_subject_id("sub-new")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn new_user_with_invalid_org_id_creates_nothing() {
        let a = org("A");
        let fx = fixture(&[a.clone()]).await;

        let req = LoginRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("L".to_string()),
            associate_with_org_ids: Some(vec![a.id, Uuid::new_v4()]),
        };
        let err = fx
            .login
            .login(&header_ctx("sub-1", "a@example.com"), req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(fx
            .store
            .find_user_by_subject_id("sub-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn new_user_with_single_org_is_auto_selected() {
        let a = org("A");
        let fx = fixture(&[a.clone()]).await;

        let req = LoginRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("L".to_string()),
            associate_with_org_ids: Some(vec![a.id]),
        };
        let outcome = fx
            .login
            .login(&header_ctx("sub-1", "a@example.com"), req)
            .await
            .unwrap();

        assert!(outcome.response.first_login);
        assert!(!outcome.response.requires_org_selection);

        let token = outcome.session_token.unwrap();
        let session = fx.sessions.get(&token).await.unwrap().unwrap();
        assert_eq!(session.selected_org_id, Some(a.id));
        assert!(!session.org_selection_required);
    }

    #[tokio::test]
    async fn new_user_with_multiple_orgs_requires_selection() {
        let a = org("A");
        let b = org("B");
        let fx = fixture(&[a.clone(), b.clone()]).await;

        let req = LoginRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("L".to_string()),
            associate_with_org_ids: Some(vec![a.id, b.id]),
        };
        let outcome = fx
            .login
            .login(&header_ctx("sub-1", "a@example.com"), req)
            .await
            .unwrap();

        assert!(outcome.response.first_login);
        assert!(outcome.response.requires_org_selection);
        assert_eq!(outcome.response.associated_orgs.as_ref().unwrap().len(), 2);

        let user = fx
            .store
            .find_user_by_subject_id("sub-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.organization_ids.len(), 2);
    }

    #[tokio::test]
    async fn returning_single_org_user_is_welcomed_back() {
        let a = org("A");
        let fx = fixture(&[a.clone()]).await;

        let user = User::new(
            "sub-1".to_string(),
            "a@example.com".to_string(),
            None,
            None,
            vec![a.id],
        );
        fx.store.insert_user(&user).await.unwrap();

        let outcome = fx
            .login
            .login(&header_ctx("sub-1", "a@example.com"), LoginRequest::default())
            .await
            .unwrap();

        assert!(!outcome.response.first_login);
        assert!(!outcome.response.requires_org_selection);
        assert!(outcome.response.message.contains("'A'"));
    }

    #[tokio::test]
    async fn returning_multi_org_user_gets_own_orgs_as_candidates() {
        let a = org("A");
        let b = org("B");
        let c = org("C");
        let fx = fixture(&[a.clone(), b.clone(), c]).await;

        let user = User::new(
            "sub-1".to_string(),
            "a@example.com".to_string(),
            None,
            None,
            vec![a.id, b.id],
        );
        fx.store.insert_user(&user).await.unwrap();

        let outcome = fx
            .login
            .login(&header_ctx("sub-1", "a@example.com"), LoginRequest::default())
            .await
            .unwrap();

        assert!(outcome.response.requires_org_selection);
        // The user's own organizations, not the full directory
        assert_eq!(outcome.response.available_orgs.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn returning_login_ignores_association_field() {
        let a = org("A");
        let b = org("B");
        let fx = fixture(&[a.clone(), b.clone()]).await;

        let user = User::new(
            "sub-1".to_string(),
            "a@example.com".to_string(),
            None,
            None,
            vec![a.id],
        );
        fx.store.insert_user(&user).await.unwrap();

        let req = LoginRequest {
            first_name: None,
            last_name: None,
            associate_with_org_ids: Some(vec![b.id]),
        };
        fx.login
            .login(&header_ctx("sub-1", "a@example.com"), req)
            .await
            .unwrap();

        let user = fx
            .store
            .find_user_by_subject_id("sub-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.organization_ids, vec![a.id]);
    }
}
