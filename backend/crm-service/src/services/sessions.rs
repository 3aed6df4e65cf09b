use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::Storage;
use crate::error::{AppError, Result};
use crate::models::{Session, User};

/// Opaque credential handed to the client as the session cookie value
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Sole owner of session state.
///
/// `authorize` re-reads the user on every call, so deactivating a member
/// locks out sessions that are already open.
#[derive(Clone)]
pub struct SessionGuard {
    storage: Arc<dyn Storage>,
    ttl: Duration,
}

impl SessionGuard {
    pub fn new(storage: Arc<dyn Storage>, ttl_days: i64) -> Self {
        Self {
            storage,
            ttl: Duration::days(ttl_days),
        }
    }

    pub async fn establish(&self, user: &User) -> Result<SessionCredential> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.ttl;

        self.storage
            .insert_session(Session {
                token_hash: hash_token(&token),
                user_id: user.id,
                created_at: now,
                expires_at,
            })
            .await?;

        info!(user_id = %user.id, %expires_at, "Session established");
        Ok(SessionCredential { token, expires_at })
    }

    pub async fn authorize(&self, token: Option<&str>) -> Result<User> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;
        let token_hash = hash_token(token);

        let session = self
            .storage
            .find_session(&token_hash)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if session.is_expired(Utc::now()) {
            debug!(user_id = %session.user_id, "Session expired");
            self.storage.delete_session(&token_hash).await?;
            return Err(AppError::Unauthenticated);
        }

        match self.storage.find_user_by_id(session.user_id).await? {
            Some(user) if user.is_active => Ok(user),
            Some(user) => {
                debug!(user_id = %user.id, "Session rejected: account deactivated");
                Err(AppError::Unauthenticated)
            }
            None => Err(AppError::Unauthenticated),
        }
    }

    /// Destroy the session behind `token`. Unknown or missing tokens are a no-op.
    pub async fn terminate(&self, token: Option<&str>) -> Result<()> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        if self.storage.delete_session(&hash_token(token)).await? {
            debug!("Session terminated");
        }
        Ok(())
    }

    pub async fn prune_expired(&self) -> Result<u64> {
        let removed = self.storage.delete_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Pruned expired sessions");
        }
        Ok(removed)
    }
}

/// Run `prune_expired` on a fixed interval for the life of the process.
pub fn spawn_session_pruner(guard: SessionGuard, interval: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = guard.prune_expired().await {
                warn!(error = %e, "Session pruning failed");
            }
        }
    })
}
