//! HTTP-level tests for the attendance API.
//!
//! Drives the full router (auth extractor, JSON rejections, error bodies)
//! against an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rollcall::config::Config;
use rollcall::db;
use rollcall::middleware::auth::create_access_token;
use rollcall::routes::{router, AppState};

const SECRET: &str = "api-test-secret";

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        db_max_connections: 1,
        pin_length: 5,
        qr_ttl_secs: 3600,
        redeem_timeout_ms: 30_000,
        sweep_interval_secs: 0,
        allow_self_register: true,
        opener_roles: vec!["instructor".to_string(), "admin".to_string()],
    }
}

async fn setup_app() -> Router {
    let pool = db::connect_in_memory().await.expect("in-memory pool");
    router(AppState::new(pool, &test_config()))
}

fn bearer(user_id: &str, role: &str) -> String {
    let token = create_access_token(user_id, role, SECRET, chrono::Duration::minutes(10))
        .expect("token");
    format!("Bearer {token}")
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    send_request(app, request).await
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn open(app: &Router, auth: &str, label: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/sessions",
        Some(auth),
        Some(json!({ "label": label })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn redeem(app: &Router, code: &str, token: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/redeem",
        None,
        Some(json!({ "code": code, "presented_identity_token": token })),
    )
    .await
}

#[tokio::test]
async fn health_reports_ok() {
    let app = setup_app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn open_then_redeem_by_pin_and_by_qr() {
    let app = setup_app().await;
    let teacher = bearer("t-1", "instructor");

    let opened = open(&app, &teacher, "Algebra").await;
    let code = opened["session"]["code"].as_str().unwrap().to_string();
    let qr = opened["qr_payload"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 5);
    assert_eq!(opened["session"]["active"], true);

    let (status, receipt) = redeem(&app, &code, "ana@school.edu").await;
    assert_eq!(status, StatusCode::OK, "{receipt}");
    assert_eq!(receipt["session_label"], "Algebra");
    assert_eq!(receipt["display_name"], "ana");

    let (status, receipt) = redeem(&app, &qr, "bo@school.edu").await;
    assert_eq!(status, StatusCode::OK, "{receipt}");

    let (status, body) = redeem(&app, &code, "ana@school.edu").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_redeemed");
}

#[tokio::test]
async fn redeem_failures_are_distinguishable_by_code() {
    let app = setup_app().await;
    let teacher = bearer("t-1", "instructor");
    let opened = open(&app, &teacher, "Algebra").await;
    let code = opened["session"]["code"].as_str().unwrap().to_string();
    let wrong = if code == "00000" { "11111" } else { "00000" };

    let (status, body) = redeem(&app, wrong, "ana@school.edu").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "invalid_or_expired_code");

    let (status, body) = redeem(&app, &code, "not-an-email").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "identity_not_found");

    let (status, body) = redeem(&app, "", "ana@school.edu").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let app = setup_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/redeem")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"code\": "))
        .unwrap();
    let (status, body) = send_request(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn owner_routes_require_a_token() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sessions",
        None,
        Some(json!({ "label": "Algebra" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "missing_token");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/sessions",
        Some("Bearer not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_token");
}

#[tokio::test]
async fn students_cannot_open_sessions() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sessions",
        Some(&bearer("s-1", "student")),
        Some(json!({ "label": "Algebra" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn owner_watches_attendance_and_closes() {
    let app = setup_app().await;
    let teacher = bearer("t-1", "instructor");
    let opened = open(&app, &teacher, "Algebra").await;
    let id = opened["session"]["id"].as_str().unwrap().to_string();
    let code = opened["session"]["code"].as_str().unwrap().to_string();

    redeem(&app, &code, "ana@school.edu").await;

    let attendance_path = format!("/api/v1/sessions/{id}/attendance");
    let (status, snapshot) = send(&app, Method::GET, &attendance_path, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["count"], 1);
    assert_eq!(snapshot["attendees"][0]["display_name"], "ana");

    // another instructor may not watch this session
    let (status, _) = send(
        &app,
        Method::GET,
        &attendance_path,
        Some(&bearer("t-2", "instructor")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let close_path = format!("/api/v1/sessions/{id}/close");
    let (status, closed) = send(&app, Method::POST, &close_path, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["active"], false);

    let (status, body) = redeem(&app, &code, "bo@school.edu").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "invalid_or_expired_code");

    let (_, snapshot) = send(&app, Method::GET, &attendance_path, Some(&teacher), None).await;
    assert_eq!(snapshot["count"], 1);
    assert_eq!(snapshot["active"], false);
}

#[tokio::test]
async fn rotation_invalidates_the_previous_pin() {
    let app = setup_app().await;
    let teacher = bearer("t-1", "instructor");
    let opened = open(&app, &teacher, "Algebra").await;
    let id = opened["session"]["id"].as_str().unwrap().to_string();
    let old_code = opened["session"]["code"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app,
        Method::POST,
        &format!("/api/v1/sessions/{id}/rotate"),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_code = rotated["session"]["code"].as_str().unwrap().to_string();
    assert_ne!(new_code, old_code);

    let (status, _) = redeem(&app, &old_code, "ana@school.edu").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = redeem(&app, &new_code, "ana@school.edu").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/sessions/does-not-exist",
        Some(&bearer("t-1", "instructor")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn polling_with_the_returned_cursor_yields_only_new_check_ins() {
    let app = setup_app().await;
    let teacher = bearer("t-1", "instructor");
    let opened = open(&app, &teacher, "Algebra").await;
    let id = opened["session"]["id"].as_str().unwrap().to_string();
    let code = opened["session"]["code"].as_str().unwrap().to_string();
    let attendance_path = format!("/api/v1/sessions/{id}/attendance");

    redeem(&app, &code, "ana@school.edu").await;
    let (_, first) = send(&app, Method::GET, &attendance_path, Some(&teacher), None).await;
    let cursor = first["cursor"].as_i64().unwrap();

    redeem(&app, &code, "bo@school.edu").await;
    let (status, next) = send(
        &app,
        Method::GET,
        &format!("{attendance_path}?after={cursor}"),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["count"], 2);
    assert_eq!(next["attendees"].as_array().unwrap().len(), 1);
    assert_eq!(next["attendees"][0]["display_name"], "bo");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("{attendance_path}?after=yesterday"),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}
