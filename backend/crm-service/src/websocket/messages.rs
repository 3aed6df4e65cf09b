use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Customer, CustomerNote};

/// Transient change notification pushed to observers.
///
/// Wire shape is `{"type": "...", "payload": ...}`. Clients treat it as a
/// cache-invalidation hint and refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChangeEvent {
    CustomerCreated(Customer),
    CustomerUpdated(Customer),
    CustomerDeleted { id: Uuid },
    NoteCreated(CustomerNote),
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::CustomerCreated(_) => "customer_created",
            ChangeEvent::CustomerUpdated(_) => "customer_updated",
            ChangeEvent::CustomerDeleted { .. } => "customer_deleted",
            ChangeEvent::NoteCreated(_) => "note_created",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
