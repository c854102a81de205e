//! Credential lifecycle: issue, read (masked), rotate, delete.
//!
//! Every operation runs under an org-gated context and re-checks two things
//! before touching a row: the caller created the credential, and the
//! credential belongs to the organization selected in the session. Plaintext
//! secrets exist only in responses — at rest there is only ciphertext.

use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::credential::{CreateCredentialRequest, CredentialResponse};
use crate::error::{AppError, ResourceKind};
use crate::middleware::RequestContext;
use crate::models::{Credential, User};
use crate::services::{SecretCipher, Store};
use crate::utils::{generate_client_id, generate_client_secret, mask};

#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn Store>,
    cipher: SecretCipher,
}

impl CredentialService {
    pub fn new(store: Arc<dyn Store>, cipher: SecretCipher) -> Self {
        Self { store, cipher }
    }

    /// Issue a credential scoped to the session's selected organization.
    /// The returned secret is the only time it is ever visible unmasked
    /// alongside a masked-read path.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: CreateCredentialRequest,
    ) -> Result<CredentialResponse, AppError> {
        let selected_org_id = ctx.selected_org_id.ok_or_else(|| {
            AppError::InvalidArgument(
                "No organization selected for this session".to_string(),
            )
        })?;

        let user = self.acting_user(ctx).await?;

        let org = self
            .store
            .find_org_by_id(selected_org_id)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "Selected organization with ID: {} no longer exists",
                    selected_org_id
                ))
            })?;

        let client_id = generate_client_id();
        let client_secret = generate_client_secret();
        let encrypted = self.cipher.encrypt(&client_secret)?;

        let credential = Credential::new(
            client_id,
            encrypted,
            request.name,
            org.id,
            user.id,
            request.validity_days,
        );
        self.store
            .insert_credential(&credential)
            .await
            .map_err(AppError::Database)?;

        tracing::info!(
            credential_id = %credential.id,
            organization_id = %org.id,
            created_by = %user.id,
            "Credential created"
        );

        Ok(CredentialResponse {
            id: credential.id,
            client_id: credential.client_id,
            client_secret,
            name: credential.name,
            created_at: credential.created_at,
            expires_at: credential.expires_at,
        })
    }

    /// Fetch a credential the caller owns; the secret comes back masked.
    pub async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<CredentialResponse, AppError> {
        let credential = self.load_owned(ctx, id).await?;
        let plaintext = self.cipher.decrypt(&credential.client_secret)?;

        Ok(CredentialResponse {
            id: credential.id,
            client_id: credential.client_id,
            client_secret: mask(&plaintext),
            name: credential.name,
            created_at: credential.created_at,
            expires_at: credential.expires_at,
        })
    }

    /// Replace the secret in place. Every other field, including expiry,
    /// is untouched. Returns the new secret unmasked, once.
    pub async fn reset_secret(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<CredentialResponse, AppError> {
        let credential = self.load_owned(ctx, id).await?;

        let client_secret = generate_client_secret();
        let encrypted = self.cipher.encrypt(&client_secret)?;

        let updated = self
            .store
            .update_credential_secret(id, &encrypted)
            .await
            .map_err(AppError::Database)?;
        if !updated {
            // Deleted between the ownership check and the write.
            return Err(AppError::NotFound {
                kind: ResourceKind::Credential,
                id: id.to_string(),
            });
        }

        tracing::info!(credential_id = %id, "Credential secret reset");

        Ok(CredentialResponse {
            id: credential.id,
            client_id: credential.client_id,
            client_secret,
            name: credential.name,
            created_at: credential.created_at,
            expires_at: credential.expires_at,
        })
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), AppError> {
        self.load_owned(ctx, id).await?;

        let deleted = self
            .store
            .delete_credential(id)
            .await
            .map_err(AppError::Database)?;
        if !deleted {
            return Err(AppError::NotFound {
                kind: ResourceKind::Credential,
                id: id.to_string(),
            });
        }

        tracing::info!(credential_id = %id, "Credential deleted");
        Ok(())
    }

    async fn acting_user(&self, ctx: &RequestContext) -> Result<User, AppError> {
        self.store
            .find_user_by_subject_id(&ctx.subject_id)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound {
                kind: ResourceKind::User,
                id: ctx.subject_id.clone(),
            })
    }

    /// Load a credential and enforce creator ownership plus session org
    /// scope. A mismatch on either is 403, not 404: the id is real, the
    /// caller simply may not act on it.
    async fn load_owned(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Credential, AppError> {
        let credential = self
            .store
            .find_credential_by_id(id)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound {
                kind: ResourceKind::Credential,
                id: id.to_string(),
            })?;

        let user = self.acting_user(ctx).await?;

        if credential.created_by != user.id {
            return Err(AppError::NotPermitted(format!(
                "User with ID: {} is not the owner of credential with ID: {}",
                user.id, id
            )));
        }

        if ctx.selected_org_id != Some(credential.organization_id) {
            return Err(AppError::NotPermitted(format!(
                "Credential with ID: {} does not belong to the selected organization",
                id
            )));
        }

        Ok(credential)
    }
}
