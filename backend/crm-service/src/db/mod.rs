//! Storage layer
//!
//! Repository traits consumed by the services, with a PostgreSQL
//! implementation for deployments and an in-memory one for tests and local
//! development. Services hold an `Arc<dyn Storage>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Customer, CustomerFilter, CustomerNote, CustomerPatch, Invitation, NewActivity, NewCustomer,
    NewCustomerNote, NewUser, Session, TeamActivity, User,
};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violated; carries the constraint or field name
    #[error("conflict on {0}")]
    Conflict(String),

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of the first-login write
#[derive(Debug, Clone)]
pub enum UserCreation {
    /// User inserted and invitation consumed in one transaction
    Created(User),
    /// Another login created this email first; nothing was written
    EmailTaken,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Fails with `Conflict` when an unused invitation already exists for the email.
    async fn insert_invitation(&self, email: &str, invited_by: &str) -> StoreResult<Invitation>;

    async fn find_unused_invitation(&self, email: &str) -> StoreResult<Option<Invitation>>;

    /// Fails with `NotFound` when missing or already used.
    async fn consume_invitation(&self, id: Uuid) -> StoreResult<Invitation>;

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Insert the user and consume the invitation atomically.
    ///
    /// Returns `EmailTaken` without side effects when the email already has a
    /// user, and `NotFound` when the invitation was consumed concurrently.
    async fn create_user_with_invitation(
        &self,
        user: NewUser,
        invitation_id: Uuid,
    ) -> StoreResult<UserCreation>;

    async fn set_user_active(&self, email: &str, active: bool) -> StoreResult<User>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: Session) -> StoreResult<()>;

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    /// Returns whether a row was removed.
    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Ordered by `updated_at` descending.
    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>>;

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;

    async fn insert_customer(&self, customer: NewCustomer) -> StoreResult<Customer>;

    async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> StoreResult<Customer>;

    /// Deletes the customer and its notes; returns the removed record.
    async fn delete_customer(&self, id: Uuid) -> StoreResult<Customer>;

    /// Newest first.
    async fn list_notes(&self, customer_id: Uuid) -> StoreResult<Vec<CustomerNote>>;

    async fn insert_note(&self, note: NewCustomerNote) -> StoreResult<CustomerNote>;

    async fn count_customers(&self) -> StoreResult<i64>;

    async fn count_customers_with_status(&self, status: &str) -> StoreResult<i64>;

    async fn count_notes(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert_activity(&self, entry: NewActivity) -> StoreResult<TeamActivity>;

    /// Newest first.
    async fn recent_activity(&self, limit: i64) -> StoreResult<Vec<TeamActivity>>;

    async fn count_activity_since(&self, action: &str, since: DateTime<Utc>) -> StoreResult<i64>;
}

/// Everything the service needs from a backing store
pub trait Storage:
    InvitationRepository
    + UserRepository
    + SessionRepository
    + CustomerRepository
    + ActivityRepository
{
}

impl<T> Storage for T where
    T: InvitationRepository
        + UserRepository
        + SessionRepository
        + CustomerRepository
        + ActivityRepository
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_other_errors_map_to_database() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
