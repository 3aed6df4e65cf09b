use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to members whose provider profile has no display name.
pub const DEFAULT_DISPLAY_NAME: &str = "Unknown User";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub external_id: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a user on first login
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub external_id: Option<String>,
    pub profile_picture: Option<String>,
}

/// Verified identity assertion handed over by the identity provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIdentity {
    pub email: Option<String>,
    pub external_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// What `/api/auth/user` exposes about the signed-in member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            profile_picture: user.profile_picture.clone(),
            created_at: user.created_at,
        }
    }
}
