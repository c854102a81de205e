//! Entity storage for users, organizations, and credentials.
//!
//! The service only depends on the [`Store`] trait; `MongoStore` is the
//! production implementation and `InMemoryStore` backs the test suites.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Credential, Organization, User};

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error>;
    async fn find_user_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<User>, anyhow::Error>;
    async fn find_all_users(&self) -> Result<Vec<User>, anyhow::Error>;
    /// Live membership check against current storage, not a session snapshot.
    async fn is_member_of_org(&self, subject_id: &str, org_id: Uuid)
        -> Result<bool, anyhow::Error>;

    async fn insert_organization(&self, org: &Organization) -> Result<(), anyhow::Error>;
    async fn find_org_by_id(&self, id: Uuid) -> Result<Option<Organization>, anyhow::Error>;
    async fn find_orgs_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>, anyhow::Error>;
    async fn find_all_orgs(&self) -> Result<Vec<Organization>, anyhow::Error>;

    async fn insert_credential(&self, credential: &Credential) -> Result<(), anyhow::Error>;
    async fn find_credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, anyhow::Error>;
    /// Swap the encrypted secret in place. Returns false if the id is unknown.
    async fn update_credential_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
    ) -> Result<bool, anyhow::Error>;
    /// Returns false if the id is unknown (second delete of the same id fails).
    async fn delete_credential(&self, id: Uuid) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to MongoDB: {}", e))?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn organizations(&self) -> Collection<Organization> {
        self.db.collection("organizations")
    }

    fn credentials(&self) -> Collection<Credential> {
        self.db.collection("credentials")
    }

    /// Unique indexes back the uniqueness invariants: subject id and email
    /// per user, client id per credential.
    pub async fn initialize_indexes(&self) -> Result<(), anyhow::Error> {
        let unique = IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "subject_id": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;
        self.credentials()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "client_id": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error> {
        Ok(self
            .users()
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn find_user_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self
            .users()
            .find_one(doc! { "subject_id": subject_id }, None)
            .await?)
    }

    async fn find_all_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let cursor = self.users().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn is_member_of_org(
        &self,
        subject_id: &str,
        org_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        let found = self
            .users()
            .find_one(
                doc! {
                    "subject_id": subject_id,
                    "organization_ids": org_id.to_string(),
                },
                None,
            )
            .await?;
        Ok(found.is_some())
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), anyhow::Error> {
        self.organizations().insert_one(org, None).await?;
        Ok(())
    }

    async fn find_org_by_id(&self, id: Uuid) -> Result<Option<Organization>, anyhow::Error> {
        Ok(self
            .organizations()
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn find_orgs_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>, anyhow::Error> {
        let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let cursor = self
            .organizations()
            .find(doc! { "_id": { "$in": id_strings } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_all_orgs(&self) -> Result<Vec<Organization>, anyhow::Error> {
        let cursor = self.organizations().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<(), anyhow::Error> {
        self.credentials().insert_one(credential, None).await?;
        Ok(())
    }

    async fn find_credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, anyhow::Error> {
        Ok(self
            .credentials()
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn update_credential_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .credentials()
            .update_one(
                doc! { "_id": id.to_string() },
                doc! { "$set": { "client_secret": encrypted_secret } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_credential(&self, id: Uuid) -> Result<bool, anyhow::Error> {
        let result = self
            .credentials()
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| anyhow::anyhow!("MongoDB health check failed: {}", e))?;
        Ok(())
    }
}

/// In-memory store used by the test suites.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    organizations: Mutex<HashMap<Uuid, Organization>>,
    credentials: Mutex<HashMap<Uuid, Credential>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        self.users
            .lock()
            .map_err(|e| anyhow::anyhow!("users mutex poisoned: {}", e))?
            .insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, anyhow::Error> {
        let users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("users mutex poisoned: {}", e))?;
        Ok(users.get(&id).cloned())
    }

    async fn find_user_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        let users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("users mutex poisoned: {}", e))?;
        Ok(users.values().find(|u| u.subject_id == subject_id).cloned())
    }

    async fn find_all_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("users mutex poisoned: {}", e))?;
        Ok(users.values().cloned().collect())
    }

    async fn is_member_of_org(
        &self,
        subject_id: &str,
        org_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        let users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("users mutex poisoned: {}", e))?;
        Ok(users
            .values()
            .any(|u| u.subject_id == subject_id && u.is_member_of(org_id)))
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), anyhow::Error> {
        self.organizations
            .lock()
            .map_err(|e| anyhow::anyhow!("orgs mutex poisoned: {}", e))?
            .insert(org.id, org.clone());
        Ok(())
    }

    async fn find_org_by_id(&self, id: Uuid) -> Result<Option<Organization>, anyhow::Error> {
        let orgs = self
            .organizations
            .lock()
            .map_err(|e| anyhow::anyhow!("orgs mutex poisoned: {}", e))?;
        Ok(orgs.get(&id).cloned())
    }

    async fn find_orgs_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>, anyhow::Error> {
        let orgs = self
            .organizations
            .lock()
            .map_err(|e| anyhow::anyhow!("orgs mutex poisoned: {}", e))?;
        Ok(ids.iter().filter_map(|id| orgs.get(id).cloned()).collect())
    }

    async fn find_all_orgs(&self) -> Result<Vec<Organization>, anyhow::Error> {
        let orgs = self
            .organizations
            .lock()
            .map_err(|e| anyhow::anyhow!("orgs mutex poisoned: {}", e))?;
        Ok(orgs.values().cloned().collect())
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<(), anyhow::Error> {
        self.credentials
            .lock()
            .map_err(|e| anyhow::anyhow!("credentials mutex poisoned: {}", e))?
            .insert(credential.id, credential.clone());
        Ok(())
    }

    async fn find_credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, anyhow::Error> {
        let creds = self
            .credentials
            .lock()
            .map_err(|e| anyhow::anyhow!("credentials mutex poisoned: {}", e))?;
        Ok(creds.get(&id).cloned())
    }

    async fn update_credential_secret(
        &self,
        id: Uuid,
        encrypted_secret: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut creds = self
            .credentials
            .lock()
            .map_err(|e| anyhow::anyhow!("credentials mutex poisoned: {}", e))?;
        match creds.get_mut(&id) {
            Some(cred) => {
                cred.client_secret = encrypted_secret.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_credential(&self, id: Uuid) -> Result<bool, anyhow::Error> {
        let mut creds = self
            .credentials
            .lock()
            .map_err(|e| anyhow::anyhow!("credentials mutex poisoned: {}", e))?;
        Ok(creds.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
