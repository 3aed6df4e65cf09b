//! HTTP surface tests against the in-memory store and a fake identity provider

mod common;

use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};

use common::{test_state, FakeProvider};
use crm_service::db::{InvitationRepository, MemoryStorage, UserRepository};
use crm_service::error::AppError;
use crm_service::handlers;
use crm_service::middleware::{OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crm_service::models::ExternalIdentity;
use crm_service::AppState;

/// Invite, resolve and open a session for `email`; returns the session cookie.
async fn member_cookie(state: &AppState, store: &MemoryStorage, email: &str) -> Cookie<'static> {
    store.insert_invitation(email, "system").await.unwrap();
    let user = state
        .identity
        .resolve(&ExternalIdentity {
            email: Some(email.to_string()),
            external_id: format!("ext-{}", email),
            display_name: Some("Ann Lee".to_string()),
            picture_url: None,
        })
        .await
        .unwrap();
    let credential = state.sessions.establish(&user).await.unwrap();
    Cookie::new(SESSION_COOKIE, credential.token)
}

fn customer_body(email: &str) -> Value {
    json!({
        "firstName": "Emma",
        "lastName": "Thompson",
        "email": email,
        "phone": "+44-20-7946-0958",
        "company": "EuroTech Limited",
        "role": "Head of Operations",
        "status": "active",
        "region": "europe"
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn protected_routes_require_a_session() {
    let (_store, state) = test_state(FakeProvider::default());
    let app = app!(state);

    let id = uuid::Uuid::new_v4();
    let routes = vec![
        test::TestRequest::get().uri("/api/auth/user"),
        test::TestRequest::get().uri("/api/customers"),
        test::TestRequest::post().uri("/api/customers").set_json(customer_body("a@b.com")),
        test::TestRequest::get().uri(&format!("/api/customers/{}", id)),
        test::TestRequest::delete().uri(&format!("/api/customers/{}", id)),
        test::TestRequest::get().uri(&format!("/api/customers/{}/notes", id)),
        test::TestRequest::get().uri("/api/team-activity"),
        test::TestRequest::get().uri("/api/analytics"),
        test::TestRequest::get().uri("/api/invitations"),
        test::TestRequest::get().uri("/api/export"),
        test::TestRequest::get().uri("/ws"),
    ];

    for req in routes {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Authentication required");
    }

    // Nothing was written on the way.
    assert_eq!(state.activity.recent(None).await.unwrap().len(), 0);
}

#[actix_web::test]
async fn health_is_public() {
    let (_store, state) = test_state(FakeProvider::default());
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn oauth_login_round_trip() {
    let provider = FakeProvider::default().with("good-code", Some("Ann@Team.dev"), "fb-1");
    let (store, state) = test_state(provider);
    store.insert_invitation("ann@team.dev", "system").await.unwrap();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/facebook").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let state_cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == OAUTH_STATE_COOKIE)
        .expect("state cookie")
        .into_owned();
    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.ends_with(state_cookie.value()));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!(
                "/auth/facebook/callback?code=good-code&state={}",
                state_cookie.value()
            ))
            .cookie(state_cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
    let session = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .expect("session cookie")
        .into_owned();
    assert_eq!(session.http_only(), Some(true));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/user")
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Value = test::read_body_json(resp).await;
    assert_eq!(profile["email"], "ann@team.dev");
    assert_eq!(profile["name"], "Member fb-1");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/logout")
            .cookie(session.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Logged out successfully");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/user")
            .cookie(session)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn failed_logins_share_one_redirect() {
    let provider = FakeProvider::default()
        .with("uninvited", Some("stranger@x.com"), "fb-2")
        .with("no-email", None, "fb-3")
        .with("deactivated", Some("former@team.dev"), "fb-4");
    let (store, state) = test_state(provider);

    // A deactivated member holding an open invitation.
    member_cookie(&state, &store, "former@team.dev").await;
    store.set_user_active("former@team.dev", false).await.unwrap();
    store.insert_invitation("former@team.dev", "system").await.unwrap();
    let app = app!(state);

    let cases = [
        // Uninvited email.
        ("/auth/facebook/callback?code=uninvited&state=s1", Some("s1")),
        // Provider gave no email.
        ("/auth/facebook/callback?code=no-email&state=s1", Some("s1")),
        // Account deactivated.
        ("/auth/facebook/callback?code=deactivated&state=s1", Some("s1")),
        // State does not match the cookie.
        ("/auth/facebook/callback?code=uninvited&state=forged", Some("s1")),
        // No state cookie at all.
        ("/auth/facebook/callback?code=uninvited&state=s1", None),
        // User denied access at the provider.
        ("/auth/facebook/callback?error=access_denied&state=s1", Some("s1")),
        // Unknown code; provider exchange fails.
        ("/auth/facebook/callback?code=bogus&state=s1", Some("s1")),
    ];

    for (uri, state_value) in cases {
        let mut req = test::TestRequest::get().uri(uri);
        if let Some(value) = state_value {
            req = req.cookie(Cookie::new(OAUTH_STATE_COOKIE, value));
        }
        let resp = test::call_service(&app, req.to_request()).await;

        assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?error=auth_failed",
            "{}",
            uri
        );
        assert!(
            resp.response()
                .cookies()
                .all(|c| c.name() != SESSION_COOKIE),
            "{}",
            uri
        );
    }

    assert!(store.find_user_by_email("stranger@x.com").await.unwrap().is_none());

    // The deactivated case was rejected for deactivation, not for a missing invitation.
    let err = state
        .identity
        .resolve(&ExternalIdentity {
            email: Some("former@team.dev".to_string()),
            external_id: "fb-4".to_string(),
            display_name: None,
            picture_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountDeactivated));
}

#[actix_web::test]
async fn deactivated_member_is_locked_out() {
    let (store, state) = test_state(FakeProvider::default());
    let cookie = member_cookie(&state, &store, "ann@team.dev").await;
    let app = app!(state);

    let req = || {
        test::TestRequest::get()
            .uri("/api/customers")
            .cookie(cookie.clone())
            .to_request()
    };
    assert_eq!(test::call_service(&app, req()).await.status(), StatusCode::OK);

    store.set_user_active("ann@team.dev", false).await.unwrap();
    assert_eq!(
        test::call_service(&app, req()).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn customer_lifecycle_records_activity_and_broadcasts() {
    let (store, state) = test_state(FakeProvider::default());
    let cookie = member_cookie(&state, &store, "ann@team.dev").await;
    let mut feed = state.broadcaster.subscribe().await;
    let app = app!(state);

    // Create
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/customers")
            .cookie(cookie.clone())
            .set_json(customer_body("emma@eurotech.eu"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "active");

    // Filtered list
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/customers?status=all&region=europe&search=eurotech")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/customers?status=prospect")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let list: Value = test::read_body_json(resp).await;
    assert!(list.as_array().unwrap().is_empty());

    // Update
    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/customers/{}", id))
            .cookie(cookie.clone())
            .set_json(json!({ "status": "inactive" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "inactive");
    assert_eq!(updated["company"], "EuroTech Limited");

    // Note
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/customers/{}/notes", id))
            .cookie(cookie.clone())
            .set_json(json!({ "content": "Evaluating vendors" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let note: Value = test::read_body_json(resp).await;
    assert_eq!(note["authorName"], "Ann Lee");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/customers/{}/notes", id))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let notes: Value = test::read_body_json(resp).await;
    assert_eq!(notes.as_array().unwrap().len(), 1);

    // Activity, newest first
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/team-activity?limit=2")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let activity: Value = test::read_body_json(resp).await;
    let actions: Vec<&str> = activity
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["added a note to", "updated customer"]);

    // Delete
    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/customers/{}", id))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/customers/{}", id))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let mut kinds = Vec::new();
    for _ in 0..4 {
        kinds.push(feed.receiver.recv().await.unwrap().kind());
    }
    assert_eq!(
        kinds,
        vec!["customer_created", "customer_updated", "note_created", "customer_deleted"]
    );
}

#[actix_web::test]
async fn bad_input_is_rejected_with_detail() {
    let (store, state) = test_state(FakeProvider::default());
    let cookie = member_cookie(&state, &store, "ann@team.dev").await;
    let app = app!(state);

    let mut body = customer_body("not-an-email");
    body["firstName"] = json!("");
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/customers")
            .cookie(cookie.clone())
            .set_json(body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["message"], "Validation failed");
    assert!(err["errors"]["email"].is_array());
    assert!(err["errors"]["first_name"].is_array());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/customers")
            .cookie(cookie.clone())
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/customers/not-a-uuid")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for limit in ["0", "101"] {
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/team-activity?limit={}", limit))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "limit={}", limit);
    }

    // Duplicate customer email
    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/customers")
                .cookie(cookie.clone())
                .set_json(customer_body("emma@eurotech.eu"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_web::test]
async fn invitations_reject_duplicates() {
    let (store, state) = test_state(FakeProvider::default());
    let cookie = member_cookie(&state, &store, "ann@team.dev").await;
    let app = app!(state);

    let invite = |email: &str| {
        test::TestRequest::post()
            .uri("/api/invitations")
            .cookie(cookie.clone())
            .set_json(json!({ "email": email }))
            .to_request()
    };

    let resp = test::call_service(&app, invite("new@team.dev")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["isUsed"], false);

    let resp = test::call_service(&app, invite("NEW@team.dev")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, invite("nope")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/invitations")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let list: Value = test::read_body_json(resp).await;
    // Ann's consumed invitation plus the new one.
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn export_returns_csv_and_counts_in_analytics() {
    let (store, state) = test_state(FakeProvider::default());
    let cookie = member_cookie(&state, &store, "ann@team.dev").await;
    let app = app!(state);

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/customers")
            .cookie(cookie.clone())
            .set_json(customer_body("emma@eurotech.eu"))
            .to_request(),
    )
    .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/export")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/csv"));
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("customers.csv"));

    let body = test::read_body(resp).await;
    let csv = std::str::from_utf8(&body).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "First Name,Last Name,Email,Phone,Company,Role,Status,Region,Last Contact"
    );
    assert!(lines.next().unwrap().starts_with("\"Emma\",\"Thompson\""));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/analytics")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let analytics: Value = test::read_body_json(resp).await;
    assert_eq!(
        analytics,
        json!({
            "totalCustomers": 1,
            "activeCustomers": 1,
            "totalNotes": 0,
            "recentExports": 1
        })
    );
}
