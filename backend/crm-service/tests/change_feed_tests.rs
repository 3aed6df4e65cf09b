//! `/ws` change feed over a real socket

mod common;

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use actix_web::http::header;
use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::{ws, Client};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use common::{test_state, FakeProvider};
use crm_service::db::{InvitationRepository, MemoryStorage, UserRepository};
use crm_service::handlers;
use crm_service::middleware::SESSION_COOKIE;
use crm_service::models::ExternalIdentity;
use crm_service::{AppState, ChangeEvent};

async fn start_server(state: AppState) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure)
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

async fn member_token(state: &AppState, store: &MemoryStorage, email: &str) -> String {
    store.insert_invitation(email, "system").await.unwrap();
    let user = state
        .identity
        .resolve(&ExternalIdentity {
            email: Some(email.to_string()),
            external_id: format!("ext-{}", email),
            display_name: None,
            picture_url: None,
        })
        .await
        .unwrap();
    state.sessions.establish(&user).await.unwrap().token
}

fn session_header(token: &str) -> (header::HeaderName, String) {
    (header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
}

/// Next frame that is not a heartbeat ping; `None` once the socket ends.
async fn next_frame<S, E>(connection: &mut S) -> Option<ws::Frame>
where
    S: Stream<Item = Result<ws::Frame, E>> + Unpin,
{
    loop {
        match connection.next().await {
            Some(Ok(ws::Frame::Ping(_))) | Some(Ok(ws::Frame::Pong(_))) => continue,
            Some(Ok(frame)) => return Some(frame),
            Some(Err(_)) | None => return None,
        }
    }
}

/// True when the server closes the feed within `wait`.
async fn feed_closes<S, E>(connection: &mut S, wait: Duration) -> bool
where
    S: Stream<Item = Result<ws::Frame, E>> + Unpin,
{
    let closed = async {
        loop {
            match next_frame(connection).await {
                Some(ws::Frame::Close(_)) | None => return,
                Some(_) => continue,
            }
        }
    };
    tokio::time::timeout(wait, closed).await.is_ok()
}

#[actix_rt::test]
async fn feed_delivers_events_then_closes_on_deactivation() {
    let (store, state) = test_state(FakeProvider::default());
    let token = member_token(&state, &store, "ann@team.dev").await;
    let (addr, handle) = start_server(state.clone()).await.expect("start server");

    let (header_name, header_value) = session_header(&token);
    let (_resp, mut connection) = Client::new()
        .ws(format!("http://{addr}/ws"))
        .header(header_name, header_value)
        .connect()
        .await
        .expect("connect websocket client");

    let id = Uuid::new_v4();
    let report = state.broadcaster.publish(ChangeEvent::CustomerDeleted { id }).await;
    assert_eq!(report.delivered, 1);

    match next_frame(&mut connection).await {
        Some(ws::Frame::Text(bytes)) => {
            let event = ChangeEvent::from_json(std::str::from_utf8(&bytes).unwrap()).unwrap();
            assert_eq!(event, ChangeEvent::CustomerDeleted { id });
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    store.set_user_active("ann@team.dev", false).await.unwrap();
    assert!(feed_closes(&mut connection, Duration::from_secs(5)).await);

    // The closed feed no longer counts as an observer.
    let mut observers = state.broadcaster.observer_count().await;
    for _ in 0..20 {
        if observers == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        observers = state.broadcaster.observer_count().await;
    }
    assert_eq!(observers, 0);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn feed_closes_after_logout() {
    let (store, state) = test_state(FakeProvider::default());
    let token = member_token(&state, &store, "ann@team.dev").await;
    let (addr, handle) = start_server(state.clone()).await.expect("start server");
    let client = Client::new();

    let (header_name, header_value) = session_header(&token);
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ws"))
        .header(header_name.clone(), header_value.clone())
        .connect()
        .await
        .expect("connect websocket client");

    let resp = client
        .post(format!("http://{addr}/auth/logout"))
        .insert_header((header_name, header_value))
        .send()
        .await
        .expect("logout request");
    assert!(resp.status().is_success());

    assert!(feed_closes(&mut connection, Duration::from_secs(5)).await);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn feed_stays_open_while_session_is_valid() {
    let (store, state) = test_state(FakeProvider::default());
    let token = member_token(&state, &store, "ann@team.dev").await;
    let (addr, handle) = start_server(state.clone()).await.expect("start server");

    let (header_name, header_value) = session_header(&token);
    let (_resp, mut connection) = Client::new()
        .ws(format!("http://{addr}/ws"))
        .header(header_name, header_value)
        .connect()
        .await
        .expect("connect websocket client");

    // Several re-check ticks pass without the feed closing.
    assert!(!feed_closes(&mut connection, Duration::from_millis(2_500)).await);
    assert_eq!(state.broadcaster.observer_count().await, 1);

    handle.stop(true).await;
}
