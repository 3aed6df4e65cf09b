use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web_actors::ws;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{ChangeBroadcaster, ChangeEvent, Subscription};
use crate::error::AppError;
use crate::metrics;
use crate::services::SessionGuard;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// One WebSocket connection on `/ws`, registered as a broadcaster observer.
///
/// Inbound text is ignored; the feed is server-push only. The session
/// cookie presented at the handshake is re-authorized every
/// `recheck_interval`, and the feed closes once it stops being valid
/// (logout, expiry or deactivation).
pub struct ChangeFeedSession {
    observer_id: Uuid,
    user_id: Uuid,
    receiver: Option<mpsc::Receiver<ChangeEvent>>,
    broadcaster: ChangeBroadcaster,
    sessions: SessionGuard,
    session_token: String,
    recheck_interval: Duration,
    hb: Instant,
}

impl ChangeFeedSession {
    pub fn new(
        subscription: Subscription,
        user_id: Uuid,
        broadcaster: ChangeBroadcaster,
        sessions: SessionGuard,
        session_token: String,
        recheck_interval: Duration,
    ) -> Self {
        Self {
            observer_id: subscription.id,
            user_id,
            receiver: Some(subscription.receiver),
            broadcaster,
            sessions,
            session_token,
            recheck_interval,
            hb: Instant::now(),
        }
    }

    fn start_session_recheck(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.recheck_interval, |act, ctx| {
            let sessions = act.sessions.clone();
            let token = act.session_token.clone();
            let check = async move { sessions.authorize(Some(&token)).await };

            ctx.spawn(check.into_actor(act).map(|result, act, ctx| match result {
                Ok(_) => {}
                Err(AppError::Unauthenticated) => {
                    tracing::info!(
                        observer_id = %act.observer_id,
                        user_id = %act.user_id,
                        "Session no longer valid, closing change feed"
                    );
                    ctx.close(Some(ws::CloseReason {
                        code: ws::CloseCode::Policy,
                        description: Some("session ended".to_string()),
                    }));
                    ctx.stop();
                }
                // Storage hiccup; keep the feed and try again next tick.
                Err(e) => {
                    tracing::warn!(observer_id = %act.observer_id, error = %e, "Session re-check failed");
                }
            }));
        });
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::info!(
                    observer_id = %act.observer_id,
                    user_id = %act.user_id,
                    "WebSocket heartbeat timed out, closing"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ChangeFeedSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(
            observer_id = %self.observer_id,
            user_id = %self.user_id,
            "Change feed session started"
        );
        metrics::websocket_opened();
        self.start_heartbeat(ctx);
        self.start_session_recheck(ctx);

        if let Some(receiver) = self.receiver.take() {
            ctx.add_stream(ReceiverStream::new(receiver));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!(
            observer_id = %self.observer_id,
            user_id = %self.user_id,
            "Change feed session stopped"
        );
        metrics::websocket_closed();

        let broadcaster = self.broadcaster.clone();
        let observer_id = self.observer_id;
        actix_rt::spawn(async move {
            broadcaster.unsubscribe(observer_id).await;
        });
    }
}

/// Events from the broadcaster
impl StreamHandler<ChangeEvent> for ChangeFeedSession {
    fn handle(&mut self, event: ChangeEvent, ctx: &mut Self::Context) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::warn!(error = %e, event = event.kind(), "Failed to serialize change event"),
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // Evicted by the broadcaster; the client reconnects and refetches.
        tracing::debug!(observer_id = %self.observer_id, "Observer channel closed");
        ctx.stop();
    }
}

/// Frames from the client
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChangeFeedSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(observer_id = %self.observer_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
