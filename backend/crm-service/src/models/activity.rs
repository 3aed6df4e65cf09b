use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable who-did-what entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamActivity {
    pub id: Uuid,
    pub action: String,
    pub user_name: String,
    pub customer_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub action: String,
    pub user_name: String,
    pub customer_name: Option<String>,
    pub customer_id: Option<Uuid>,
}
