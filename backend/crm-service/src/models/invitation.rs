use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// `invited_by` value for invitations issued by the operator CLI.
pub const SYSTEM_INVITER: &str = "system";

/// Invitation record
///
/// `is_used` flips to `true` exactly once, in the same write that creates the
/// invited user. Used invitations are kept as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: Uuid,
    pub email: String,
    pub invited_by: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
