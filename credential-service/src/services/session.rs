//! Session storage and the session lifecycle.
//!
//! Sessions live in an external key-value backend under `session:{token}`
//! keys with an idle TTL, so they are shared across worker processes. All
//! mutation goes through [`SessionService::update`], which centralizes the
//! read-modify-write: concurrent updates of the same token resolve as
//! last-writer-wins.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SessionData;
use crate::services::Store;
use crate::utils::generate_session_token;

const SESSION_KEY_PREFIX: &str = "session:";

/// Key-value backend keyed by opaque session token, with TTL-based expiry.
/// Expired and absent tokens are indistinguishable to callers.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn put(&self, token: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error>;
    /// Reads the value and refreshes the TTL (idle expiry).
    async fn get(&self, token: &str, ttl_seconds: i64) -> Result<Option<String>, anyhow::Error>;
    async fn delete(&self, token: &str) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisSessionBackend {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisSessionBackend {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %url, "Connecting to Redis");
        let client = Client::open(url.to_string())?;

        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    fn key(token: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, token)
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn put(&self, token: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(token))
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store session: {}", e))
    }

    async fn get(&self, token: &str, ttl_seconds: i64) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = Self::key(token);
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session: {}", e))?;

        // Touch the key so the timeout is idle-based, not absolute
        if value.is_some() {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(ttl_seconds)
                .query_async::<_, i64>(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to refresh session TTL: {}", e))?;
        }

        Ok(value)
    }

    async fn delete(&self, token: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete session: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-memory session backend used by the test suites.
#[derive(Default)]
pub struct MockSessionBackend {
    pub sessions: Mutex<HashMap<String, String>>,
}

impl MockSessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn put(&self, token: &str, value: &str, _ttl_seconds: i64) -> Result<(), anyhow::Error> {
        self.sessions
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?
            .insert(token.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, token: &str, _ttl_seconds: i64) -> Result<Option<String>, anyhow::Error> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?;
        Ok(sessions.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<(), anyhow::Error> {
        self.sessions
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?
            .remove(token);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// Session lifecycle on top of the backend: create, read, select-org,
/// invalidate.
#[derive(Clone)]
pub struct SessionService {
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn Store>,
    ttl_seconds: i64,
}

impl SessionService {
    pub fn new(backend: Arc<dyn SessionBackend>, store: Arc<dyn Store>, ttl_seconds: i64) -> Self {
        Self {
            backend,
            store,
            ttl_seconds,
        }
    }

    /// Create a session for a logged-in user.
    ///
    /// Exactly one associated organization auto-selects it; more than one
    /// leaves selection empty and flags it as required; zero also flags it
    /// as required with no candidates, which blocks credential operations
    /// until the situation is resolved out of band.
    pub async fn create(
        &self,
        user_id: Uuid,
        subject_id: &str,
        email: &str,
        associated_org_ids: Vec<Uuid>,
    ) -> Result<(String, SessionData), AppError> {
        let mut selected_org_id = None;
        let mut selected_org_name = None;

        if associated_org_ids.len() == 1 {
            let org_id = associated_org_ids[0];
            selected_org_name = self
                .store
                .find_org_by_id(org_id)
                .await
                .map_err(AppError::Database)?
                .map(|org| org.name);
            selected_org_id = Some(org_id);
        }

        let data = SessionData {
            user_id,
            subject_id: subject_id.to_string(),
            email: email.to_string(),
            selected_org_id,
            selected_org_name,
            associated_org_ids,
            org_selection_required: selected_org_id.is_none(),
        };

        let token = generate_session_token();
        self.write(&token, &data).await?;

        tracing::info!(
            subject_id = %subject_id,
            org_selection_required = data.org_selection_required,
            "Session created"
        );

        Ok((token, data))
    }

    pub async fn get(&self, token: &str) -> Result<Option<SessionData>, AppError> {
        let raw = self
            .backend
            .get(token, self.ttl_seconds)
            .await
            .map_err(AppError::Cache)?;
        match raw {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Cache(anyhow::anyhow!("Corrupt session payload: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Centralized read-modify-write. Concurrent updates of the same token
    /// resolve as last-writer-wins; the mutator always sees the freshest
    /// state this worker can observe.
    pub async fn update<F>(&self, token: &str, mutate: F) -> Result<SessionData, AppError>
    where
        F: FnOnce(&mut SessionData),
    {
        let mut data = self.get(token).await?.ok_or_else(|| {
            AppError::LoginRequired("No active session. Please login first.".to_string())
        })?;
        mutate(&mut data);
        self.write(token, &data).await?;
        Ok(data)
    }

    /// Select an organization for the session.
    ///
    /// The candidate must be in the session's membership snapshot and must
    /// resolve to a live organization; a rejected selection leaves the
    /// stored session unchanged.
    pub async fn select_organization(
        &self,
        token: &str,
        org_id: Uuid,
    ) -> Result<SessionData, AppError> {
        let data = self.get(token).await?.ok_or_else(|| {
            AppError::LoginRequired("No active session. Please login first.".to_string())
        })?;

        if !data.associated_org_ids.contains(&org_id) {
            return Err(AppError::NotPermitted(format!(
                "User is not a member of organization: {}",
                org_id
            )));
        }

        let org = self
            .store
            .find_org_by_id(org_id)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound {
                kind: crate::error::ResourceKind::Organization,
                id: org_id.to_string(),
            })?;

        let updated = self
            .update(token, |session| {
                session.selected_org_id = Some(org_id);
                session.selected_org_name = Some(org.name.clone());
                session.org_selection_required = false;
            })
            .await?;

        tracing::info!(org_id = %org_id, org_name = %updated.selected_org_name.as_deref().unwrap_or(""), "Organization selected for session");

        Ok(updated)
    }

    pub async fn invalidate(&self, token: &str) -> Result<(), AppError> {
        self.backend.delete(token).await.map_err(AppError::Cache)?;
        tracing::info!("Session invalidated");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.backend.health_check().await
    }

    async fn write(&self, token: &str, data: &SessionData) -> Result<(), AppError> {
        let json = serde_json::to_string(data)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Session serialization: {}", e)))?;
        self.backend
            .put(token, &json, self.ttl_seconds)
            .await
            .map_err(AppError::Cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Organization, User};
    use crate::services::InMemoryStore;

    async fn service_with_orgs(orgs: &[Organization]) -> (SessionService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        for org in orgs {
            store.insert_organization(org).await.unwrap();
        }
        let backend = Arc::new(MockSessionBackend::new());
        let service = SessionService::new(backend, store.clone(), 1800);
        (service, store)
    }

    #[tokio::test]
    async fn single_org_is_auto_selected() {
        let org = Organization::new("Acme".to_string(), "VAT1".to_string(), "SAP1".to_string());
        let (service, _) = service_with_orgs(&[org.clone()]).await;

        let (_, data) = service
            .create(Uuid::new_v4(), "sub-1", "u@example.com", vec![org.id])
            .await
            .unwrap();

        assert_eq!(data.selected_org_id, Some(org.id));
        assert_eq!(data.selected_org_name.as_deref(), Some("Acme"));
        assert!(!data.org_selection_required);
    }

    #[tokio::test]
    async fn multiple_orgs_require_selection() {
        let a = Organization::new("A".to_string(), "VA".to_string(), "SA".to_string());
        let b = Organization::new("B".to_string(), "VB".to_string(), "SB".to_string());
        let (service, _) = service_with_orgs(&[a.clone(), b.clone()]).await;

        let (token, data) = service
            .create(Uuid::new_v4(), "sub-1", "u@example.com", vec![a.id, b.id])
            .await
            .unwrap();

        assert!(data.selected_org_id.is_none());
        assert!(data.org_selection_required);

        let updated = service.select_organization(&token, a.id).await.unwrap();
        assert_eq!(updated.selected_org_id, Some(a.id));
        assert!(!updated.org_selection_required);

        // flag stays false for this session
        let fetched = service.get(&token).await.unwrap().unwrap();
        assert!(!fetched.org_selection_required);
    }

    #[tokio::test]
    async fn zero_orgs_block_selection() {
        let (service, _) = service_with_orgs(&[]).await;
        let (_, data) = service
            .create(Uuid::new_v4(), "sub-1", "u@example.com", vec![])
            .await
            .unwrap();
        assert!(data.org_selection_required);
        assert!(data.associated_org_ids.is_empty());
    }

    #[tokio::test]
    async fn selecting_non_member_org_leaves_session_unchanged() {
        let a = Organization::new("A".to_string(), "VA".to_string(), "SA".to_string());
        let b = Organization::new("B".to_string(), "VB".to_string(), "SB".to_string());
        let outsider = Organization::new("X".to_string(), "VX".to_string(), "SX".to_string());
        let (service, _) = service_with_orgs(&[a.clone(), b.clone(), outsider.clone()]).await;

        let (token, _) = service
            .create(Uuid::new_v4(), "sub-1", "u@example.com", vec![a.id, b.id])
            .await
            .unwrap();
        service.select_organization(&token, a.id).await.unwrap();

        let err = service
            .select_organization(&token, outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotPermitted(_)));

        let data = service.get(&token).await.unwrap().unwrap();
        assert_eq!(data.selected_org_id, Some(a.id));
    }

    #[tokio::test]
    async fn absent_token_reads_as_no_session() {
        let (service, _) = service_with_orgs(&[]).await;
        assert!(service.get("unknown-token").await.unwrap().is_none());

        let err = service
            .select_organization("unknown-token", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoginRequired(_)));
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let org = Organization::new("Acme".to_string(), "V".to_string(), "S".to_string());
        let (service, _) = service_with_orgs(&[org.clone()]).await;
        let (token, _) = service
            .create(Uuid::new_v4(), "sub-1", "u@example.com", vec![org.id])
            .await
            .unwrap();

        service.invalidate(&token).await.unwrap();
        assert!(service.get(&token).await.unwrap().is_none());
        service.invalidate(&token).await.unwrap();
    }

    // Membership snapshot is validated even when the user record changed
    #[tokio::test]
    async fn selection_uses_session_snapshot() {
        let a = Organization::new("A".to_string(), "VA".to_string(), "SA".to_string());
        let b = Organization::new("B".to_string(), "VB".to_string(), "SB".to_string());
        let (service, store) = service_with_orgs(&[a.clone(), b.clone()]).await;

        let user = User::new(
            "sub-1".to_string(),
            "u@example.com".to_string(),
            None,
            None,
            vec![a.id, b.id],
        );
        store.insert_user(&user).await.unwrap();

        let (token, _) = service
            .create(user.id, &user.subject_id, &user.email, vec![a.id, b.id])
            .await
            .unwrap();

        // Snapshot still lists b, so selecting it succeeds; the gate catches
        // revocation on the next protected request.
        let updated = service.select_organization(&token, b.id).await.unwrap();
        assert_eq!(updated.selected_org_id, Some(b.id));
    }
}
