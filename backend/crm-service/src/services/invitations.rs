use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::{StoreError, Storage};
use crate::error::{AppError, Result};
use crate::models::{normalize_email, CreateInvitationRequest, Invitation};

/// Owns invitation records
///
/// Duplicate policy: creating an invitation while an unused one exists for
/// the same email is rejected with `DuplicateInvitation`; the existing record
/// is left untouched.
#[derive(Clone)]
pub struct InvitationLedger {
    storage: Arc<dyn Storage>,
}

impl InvitationLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_invitation(&self, email: &str, invited_by: &str) -> Result<Invitation> {
        let email = normalize_email(email);
        CreateInvitationRequest {
            email: email.clone(),
        }
        .validate()?;

        let invitation = self
            .storage
            .insert_invitation(&email, invited_by)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::DuplicateInvitation,
                other => other.into(),
            })?;

        info!(invitation_id = %invitation.id, invited_by, "Invitation created");
        Ok(invitation)
    }

    pub async fn find_active_invitation(&self, email: &str) -> Result<Option<Invitation>> {
        Ok(self
            .storage
            .find_unused_invitation(&normalize_email(email))
            .await?)
    }

    pub async fn consume_invitation(&self, id: Uuid) -> Result<Invitation> {
        self.storage
            .consume_invitation(id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AppError::NotFound("invitation"),
                other => other.into(),
            })
    }

    pub async fn list_invitations(&self) -> Result<Vec<Invitation>> {
        Ok(self.storage.list_invitations().await?)
    }
}
