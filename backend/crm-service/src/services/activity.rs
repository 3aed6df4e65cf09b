use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::db::Storage;
use crate::error::{AppError, Result};
use crate::models::{NewActivity, TeamActivity};

pub const ACTION_CREATED_CUSTOMER: &str = "created customer";
pub const ACTION_UPDATED_CUSTOMER: &str = "updated customer";
pub const ACTION_DELETED_CUSTOMER: &str = "deleted customer";
pub const ACTION_ADDED_NOTE: &str = "added a note to";
pub const ACTION_EXPORTED: &str = "exported customer data";

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 100;

/// Append-only who-did-what log
#[derive(Clone)]
pub struct ActivityRecorder {
    storage: Arc<dyn Storage>,
}

impl ActivityRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn record(
        &self,
        action: &str,
        actor_name: &str,
        subject_name: Option<&str>,
        subject_id: Option<Uuid>,
    ) -> Result<TeamActivity> {
        Ok(self
            .storage
            .insert_activity(NewActivity {
                action: action.to_string(),
                user_name: actor_name.to_string(),
                customer_name: subject_name.map(str::to_string),
                customer_id: subject_id,
            })
            .await?)
    }

    /// Like `record`, but a failure is logged instead of returned.
    pub async fn record_best_effort(
        &self,
        action: &str,
        actor_name: &str,
        subject_name: Option<&str>,
        subject_id: Option<Uuid>,
    ) -> Option<TeamActivity> {
        match self
            .record(action, actor_name, subject_name, subject_id)
            .await
        {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    error = %e,
                    action,
                    actor = actor_name,
                    subject_id = ?subject_id,
                    "Failed to record team activity"
                );
                None
            }
        }
    }

    /// The `limit` newest entries, newest first. `None` means the default
    /// of 10; limits outside `1..=100` are rejected.
    pub async fn recent(&self, limit: Option<i64>) -> Result<Vec<TeamActivity>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        if !(1..=MAX_RECENT_LIMIT).contains(&limit) {
            return Err(AppError::InvalidArgument(format!(
                "limit must be between 1 and {}",
                MAX_RECENT_LIMIT
            )));
        }
        Ok(self.storage.recent_activity(limit).await?)
    }

    pub async fn count_since(&self, action: &str, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.storage.count_activity_since(action, since).await?)
    }
}
