//! WebSocket change feed
//!
//! Endpoint: GET /ws (session cookie required)
use std::time::Duration;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use crate::middleware::{AuthContext, SESSION_COOKIE};
use crate::state::AppState;
use crate::websocket::ChangeFeedSession;

pub async fn change_feed(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    auth: AuthContext,
) -> Result<HttpResponse, Error> {
    // AuthContext already rejected requests without this cookie.
    let token = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();

    let subscription = state.broadcaster.subscribe().await;
    let observer_id = subscription.id;
    let session = ChangeFeedSession::new(
        subscription,
        auth.user.id,
        state.broadcaster.clone(),
        state.sessions.clone(),
        token,
        Duration::from_secs(state.config.realtime.session_recheck_secs),
    );

    match ws::start(session, &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            // Handshake failed; the actor never started, so release the slot here.
            state.broadcaster.unsubscribe(observer_id).await;
            Err(e)
        }
    }
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(change_feed));
}
