//! Identity resolution for social login
//!
//! Turns a verified provider assertion into a local member. Every login,
//! first or returning, needs an unused invitation for the email. A first
//! login consumes it in the same storage write that creates the user; a
//! returning member is admitted without consuming it. A first login that
//! loses the race for the same email continues as a returning member.
use std::sync::Arc;

use tracing::{info, warn};

use super::InvitationLedger;
use crate::db::{StoreError, Storage, UserCreation};
use crate::error::{AppError, Result};
use crate::models::user::DEFAULT_DISPLAY_NAME;
use crate::models::{normalize_email, ExternalIdentity, Invitation, NewUser, User};

#[derive(Clone)]
pub struct IdentityResolver {
    storage: Arc<dyn Storage>,
    invitations: InvitationLedger,
}

impl IdentityResolver {
    pub fn new(storage: Arc<dyn Storage>, invitations: InvitationLedger) -> Self {
        Self {
            storage,
            invitations,
        }
    }

    pub async fn resolve(&self, identity: &ExternalIdentity) -> Result<User> {
        let email = identity
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(AppError::MissingEmail)?;

        let Some(invitation) = self.invitations.find_active_invitation(&email).await? else {
            warn!(external_id = %identity.external_id, "Login rejected: no invitation");
            return Err(AppError::NoInvitation);
        };

        match self.storage.find_user_by_email(&email).await? {
            Some(user) => Self::admit_existing(user),
            None => self.create_member(identity, email, invitation).await,
        }
    }

    async fn create_member(
        &self,
        identity: &ExternalIdentity,
        email: String,
        invitation: Invitation,
    ) -> Result<User> {
        let new_user = NewUser {
            email: email.clone(),
            name: identity
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_DISPLAY_NAME)
                .to_string(),
            external_id: Some(identity.external_id.clone()),
            profile_picture: identity.picture_url.clone(),
        };

        match self
            .storage
            .create_user_with_invitation(new_user, invitation.id)
            .await
        {
            Ok(UserCreation::Created(user)) => {
                info!(
                    user_id = %user.id,
                    invitation_id = %invitation.id,
                    "Member account created from invitation"
                );
                Ok(user)
            }
            // Lost the race to a concurrent login for the same email.
            Ok(UserCreation::EmailTaken) | Err(StoreError::NotFound) => {
                self.resolve_after_race(&email).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_after_race(&self, email: &str) -> Result<User> {
        match self.storage.find_user_by_email(email).await? {
            Some(user) => Self::admit_existing(user),
            None => Err(AppError::NoInvitation),
        }
    }

    fn admit_existing(user: User) -> Result<User> {
        if !user.is_active {
            warn!(user_id = %user.id, "Login rejected: account deactivated");
            return Err(AppError::AccountDeactivated);
        }
        Ok(user)
    }
}
