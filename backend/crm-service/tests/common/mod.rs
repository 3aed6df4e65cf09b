#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use crm_service::config::{
    Config, OAuthSettings, RealtimeSettings, ServerSettings, SessionSettings,
};
use crm_service::db::{MemoryStorage, Storage};
use crm_service::error::{AppError, Result};
use crm_service::models::ExternalIdentity;
use crm_service::services::IdentityProvider;
use crm_service::AppState;

/// Identity provider that maps authorization codes to canned identities.
#[derive(Default)]
pub struct FakeProvider {
    identities: HashMap<String, ExternalIdentity>,
}

impl FakeProvider {
    pub fn with(mut self, code: &str, email: Option<&str>, external_id: &str) -> Self {
        self.identities.insert(
            code.to_string(),
            ExternalIdentity {
                email: email.map(str::to_string),
                external_id: external_id.to_string(),
                display_name: Some(format!("Member {}", external_id)),
                picture_url: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        Ok(format!("https://provider.test/authorize?state={}", state))
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity> {
        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::OAuthProvider(format!("unknown code {}", code)))
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: None,
        oauth: OAuthSettings::default(),
        session: SessionSettings::default(),
        realtime: RealtimeSettings {
            session_recheck_secs: 1,
            ..RealtimeSettings::default()
        },
    }
}

pub fn test_state(provider: FakeProvider) -> (Arc<MemoryStorage>, AppState) {
    let store = Arc::new(MemoryStorage::new());
    let storage: Arc<dyn Storage> = store.clone();
    let state = AppState::new(Arc::new(test_config()), storage, Arc::new(provider));
    (store, state)
}
