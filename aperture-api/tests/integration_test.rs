use std::net::SocketAddr;
use std::sync::Arc;

use aperture_api::{app, middleware::rate_limit::RateLimiter, state::AppState};
use aperture_core::message::ContactMessage;
use aperture_core::repository::{BookingRepository, MessageRepository};
use aperture_store::app_config::Config;
use aperture_store::{Mailer, MemoryBookingRepository, MemoryMessageRepository, MemorySessionStore};
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

struct TestServer {
    base_url: String,
    state: AppState,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    async fn spawn_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        config.admin.username = "admin".to_string();
        config.admin.password = "correct-horse".to_string();
        // Nothing listens on port 1, so email delivery fails fast without
        // failing the enclosing request.
        config.smtp.host = "127.0.0.1".to_string();
        config.smtp.port = 1;
        tweak(&mut config);

        let state = AppState {
            bookings: Arc::new(MemoryBookingRepository::new()),
            messages: Arc::new(MemoryMessageRepository::new()),
            sessions: Arc::new(MemorySessionStore::new(config.session.ttl_seconds)),
            mailer: Arc::new(Mailer::new(&config.smtp).expect("failed to build mailer")),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.max_requests,
                config.rate_limit.window_seconds,
            )),
            config: Arc::new(config),
            started_at: Utc::now(),
        };

        let app = app(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client() -> reqwest::Client {
    // Cookie jar carries the session across requests, like a browser would.
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

async fn fetch_csrf(client: &reqwest::Client, base_url: &str) -> String {
    let res = client
        .get(format!("{}/api/csrf-token", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn login(client: &reqwest::Client, base_url: &str) {
    let res = client
        .post(format!("{}/api/admin/login", base_url))
        .json(&json!({ "username": "admin", "password": "correct-horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
}

fn seeded_message(received_at: chrono::DateTime<Utc>, archived: bool, read: bool) -> ContactMessage {
    ContactMessage {
        id: Uuid::new_v4(),
        name: "Sender".to_string(),
        email: "sender@example.com".to_string(),
        phone: None,
        subject: "Availability".to_string(),
        message: "Do you shoot weddings?".to_string(),
        received_at,
        read,
        archived,
        read_at: None,
    }
}

#[tokio::test]
async fn csrf_token_minted_with_expiry() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .get(format!("{}/csrf-token", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert!(body["expires"].as_i64().unwrap() > Utc::now().timestamp());
}

#[tokio::test]
async fn contact_submission_appends_message() {
    let srv = TestServer::spawn().await;
    let client = client();
    let token = fetch_csrf(&client, &srv.base_url).await;

    let res = client
        .post(format!("{}/api/submit-contact", srv.base_url))
        .header("x-csrf-token", &token)
        .json(&json!({
            "name": "Dana",
            "email": "dana@example.com",
            "message": "Do you travel for shoots?",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["emailSent"], false);
    assert!(body["csrfToken"].as_str().is_some());
    let message_id = Uuid::parse_str(body["messageId"].as_str().unwrap()).unwrap();

    let stored = srv.state.messages.get(message_id).await.unwrap().unwrap();
    assert!(!stored.read);
    assert!(!stored.archived);
    assert_eq!(stored.subject, "New inquiry from the website");
}

#[tokio::test]
async fn contact_submission_missing_fields_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = client();
    let token = fetch_csrf(&client, &srv.base_url).await;

    let res = client
        .post(format!("{}/api/submit-contact", srv.base_url))
        .header("x-csrf-token", &token)
        .json(&json!({ "name": "Dana", "email": "dana@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The error body still hands back a usable token.
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("message"));
    assert!(body["csrfToken"].as_str().is_some());

    assert!(srv.state.messages.list(true, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn state_changing_post_without_token_is_rejected_then_retryable() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .post(format!("{}/submit-booking", srv.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CSRF_TOKEN");
    let replacement = body["csrfToken"].as_str().unwrap().to_string();
    assert!(srv.state.bookings.list(None).await.unwrap().is_empty());

    // The replacement token from the 403 works without another fetch.
    let res = client
        .post(format!("{}/submit-booking", srv.base_url))
        .header("x-csrf-token", &replacement)
        .json(&json!({
            "name": "A",
            "email": "a@b.com",
            "phone": "1",
            "eventType": "Portrait",
            "date": "2025-01-01",
            "startTime": "10:00",
            "endTime": "11:00",
            "location": "Park",
            "package": "Basic",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn booking_submission_and_confirm_flow() {
    let srv = TestServer::spawn().await;
    let client = client();
    let token = fetch_csrf(&client, &srv.base_url).await;

    let res = client
        .post(format!("{}/submit-booking", srv.base_url))
        .header("x-csrf-token", &token)
        .json(&json!({
            "name": "A",
            "email": "a@b.com",
            "phone": "1",
            "eventType": "Portrait",
            "date": "2025-01-01",
            "startTime": "10:00",
            "endTime": "11:00",
            "location": "Park",
            "package": "Basic",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    let booking_id = body["bookingId"].as_str().unwrap().to_string();

    login(&client, &srv.base_url).await;

    let res = client
        .get(format!("{}/api/admin/bookings", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["status"], "pending");

    // Login regenerated the session, so mint a fresh token before mutating.
    let token = fetch_csrf(&client, &srv.base_url).await;
    let res = client
        .post(format!(
            "{}/api/admin/bookings/{}/confirm",
            srv.base_url, booking_id
        ))
        .header("x-csrf-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "confirmed");

    // Second confirm with the rotated token: still confirmed.
    let rotated = body["csrfToken"].as_str().unwrap().to_string();
    let res = client
        .post(format!(
            "{}/api/admin/bookings/{}/confirm",
            srv.base_url, booking_id
        ))
        .header("x-csrf-token", &rotated)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn admin_routes_require_login() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .get(format!("{}/api/admin/bookings", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() {
    let srv = TestServer::spawn().await;
    let client = client();

    for creds in [
        json!({ "username": "admin", "password": "wrong" }),
        json!({ "username": "wrong", "password": "correct-horse" }),
        json!({}),
    ] {
        let res = client
            .post(format!("{}/api/admin/login", srv.base_url))
            .json(&creds)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn logout_ends_admin_session() {
    let srv = TestServer::spawn().await;
    let client = client();
    login(&client, &srv.base_url).await;

    let res = client
        .post(format!("{}/api/admin/logout", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/admin/bookings", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn check_auth_reports_session_state() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .get(format!("{}/api/admin/check-auth", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cache-control"], "no-store");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["authenticated"], false);
    assert!(body["username"].is_null());

    login(&client, &srv.base_url).await;

    let res = client
        .get(format!("{}/api/admin/check-auth", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn unknown_booking_is_404() {
    let srv = TestServer::spawn().await;
    let client = client();
    login(&client, &srv.base_url).await;

    let res = client
        .get(format!("{}/api/admin/bookings/{}", srv.base_url, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Booking not found");
}

#[tokio::test]
async fn message_listing_filters_and_read_flow() {
    let srv = TestServer::spawn().await;

    let old = seeded_message(Utc::now() - Duration::hours(2), false, false);
    let newer = seeded_message(Utc::now(), false, true);
    let archived = seeded_message(Utc::now(), true, false);
    srv.state.messages.create(old.clone()).await.unwrap();
    srv.state.messages.create(newer.clone()).await.unwrap();
    srv.state.messages.create(archived.clone()).await.unwrap();

    let client = client();
    login(&client, &srv.base_url).await;

    // Default listing: archived hidden, newest first.
    let res = client
        .get(format!("{}/api/admin/messages", srv.base_url))
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], newer.id.to_string());
    assert_eq!(listed[1]["id"], old.id.to_string());

    let res = client
        .get(format!(
            "{}/api/admin/messages?includeArchived=true&unread=true",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&old.id.to_string().as_str()));
    assert!(ids.contains(&archived.id.to_string().as_str()));
    assert!(!ids.contains(&newer.id.to_string().as_str()));

    // Reading a message does not flip the flag; mark-read does.
    let res = client
        .get(format!("{}/api/admin/messages/{}", srv.base_url, old.id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!srv.state.messages.get(old.id).await.unwrap().unwrap().read);

    let token = fetch_csrf(&client, &srv.base_url).await;
    let res = client
        .post(format!(
            "{}/api/admin/messages/{}/mark-read",
            srv.base_url, old.id
        ))
        .header("x-csrf-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["read"], true);

    let stored = srv.state.messages.get(old.id).await.unwrap().unwrap();
    assert!(stored.read);
    assert!(stored.read_at.is_some());
}

#[tokio::test]
async fn booking_export_is_a_file_download() {
    let srv = TestServer::spawn().await;
    let client = client();
    let token = fetch_csrf(&client, &srv.base_url).await;

    client
        .post(format!("{}/submit-booking", srv.base_url))
        .header("x-csrf-token", &token)
        .json(&json!({
            "name": "A",
            "email": "a@b.com",
            "phone": "1",
            "eventType": "Portrait",
            "date": "2025-01-01",
            "startTime": "10:00",
            "endTime": "11:00",
            "location": "Park",
            "package": "Basic",
        }))
        .send()
        .await
        .unwrap();

    login(&client, &srv.base_url).await;

    let res = client
        .get(format!("{}/api/admin/bookings/export", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("bookings-export.json"));

    let body: Value = serde_json::from_str(&res.text().await.unwrap()).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);

    let res = client
        .get(format!(
            "{}/api/admin/bookings/export?id={}&format=json",
            srv.base_url,
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rate_limit_rejects_over_ceiling_but_spares_health() {
    let srv = TestServer::spawn_with(|config| {
        config.rate_limit.max_requests = 3;
    })
    .await;
    let client = client();

    for _ in 0..3 {
        let res = client
            .get(format!("{}/api/csrf-token", srv.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .get(format!("{}/api/csrf-token", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert!(body["retryAfter"].as_i64().unwrap() >= Utc::now().timestamp());

    let res = client
        .get(format!("{}/api/admin/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessionStore"], "memory");
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn unmatched_api_route_is_structured_404() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .get(format!("{}/api/does-not-exist", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn security_headers_present_on_responses() {
    let srv = TestServer::spawn().await;
    let client = client();

    let res = client
        .get(format!("{}/api/csrf-token", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().contains_key("strict-transport-security"));
}
