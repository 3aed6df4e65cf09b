use std::sync::Arc;

use crate::config::Config;
use crate::db::Storage;
use crate::services::{
    ActivityRecorder, CustomerService, IdentityProvider, IdentityResolver, InvitationLedger,
    SessionGuard,
};
use crate::websocket::ChangeBroadcaster;

/// Shared application state handed to every handler via `web::Data`
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub provider: Arc<dyn IdentityProvider>,
    pub invitations: InvitationLedger,
    pub identity: IdentityResolver,
    pub sessions: SessionGuard,
    pub activity: ActivityRecorder,
    pub customers: CustomerService,
    pub broadcaster: ChangeBroadcaster,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let broadcaster = ChangeBroadcaster::new(config.realtime.observer_buffer);
        let activity = ActivityRecorder::new(storage.clone());
        let invitations = InvitationLedger::new(storage.clone());

        Self {
            identity: IdentityResolver::new(storage.clone(), invitations.clone()),
            invitations,
            sessions: SessionGuard::new(storage.clone(), config.session.ttl_days),
            customers: CustomerService::new(storage.clone(), activity.clone(), broadcaster.clone()),
            activity,
            broadcaster,
            provider,
            storage,
            config,
        }
    }
}
