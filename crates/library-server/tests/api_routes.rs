mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::core::AppState;

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn signup(app: &Router, name: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({
            "name": name,
            "email": format!("{}@uni.edu", name.to_lowercase()),
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn app() -> (tempfile::TempDir, AppState, Router) {
    let (dir, state) = common::setup().await;
    let router = library_server::app(state.clone());
    (dir, state, router)
}

#[tokio::test]
async fn test_health_is_public() {
    let (_dir, _state, app) = app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_required() {
    let (_dir, _state, app) = app().await;

    let (status, body) = call(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"].is_string());

    let (status, _) = call(&app, "GET", "/api/messages/conversations", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_me_logout() {
    let (_dir, _state, app) = app().await;
    let (token, user_id) = signup(&app, "Ada").await;

    let (status, me) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());
    assert!(me.get("password_hash").is_none());

    let (status, _) = call(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation_reports_fields() {
    let (_dir, _state, app) = app().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "", "email": "nope", "password": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["error"]["fields"];
    assert!(fields["name"].is_string());
    assert!(fields["email"].is_string());
    assert!(fields["password"].is_string());

    signup(&app, "Ada").await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "Ada 2", "email": "ada@uni.edu", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_message_round_trip_over_rest() {
    let (_dir, _state, app) = app().await;
    let (alice, alice_id) = signup(&app, "Alice").await;
    let (bob, bob_id) = signup(&app, "Bob").await;

    let (status, sent) = call(
        &app,
        "POST",
        "/api/messages",
        Some(&alice),
        Some(json!({ "to": bob_id, "body": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{sent}");
    assert_eq!(sent["sender"]["name"], "Alice");
    assert_eq!(sent["addressing"], "direct");
    let message_id = sent["id"].as_str().unwrap().to_string();

    let (_, unread) = call(&app, "GET", "/api/messages/unread", Some(&bob), None).await;
    assert_eq!(unread["unread"], 1);

    let (status, inbox) = call(&app, "GET", "/api/messages/conversations", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox[0]["counterpart"]["id"], alice_id.as_str());
    assert_eq!(inbox[0]["unread_count"], 1);

    let (status, read) = call(
        &app,
        "POST",
        &format!("/api/messages/with/{}/read", alice_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["marked_read"], 1);

    let (_, unread) = call(&app, "GET", "/api/messages/unread", Some(&bob), None).await;
    assert_eq!(unread["unread"], 0);

    // Bob cannot edit Alice's message
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/api/messages/{}", message_id),
        Some(&bob),
        Some(json!({ "body": "changed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, deleted) = call(
        &app,
        "DELETE",
        &format!("/api/messages/{}", message_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["body"], "This message was deleted");

    let (status, history) = call(
        &app,
        "GET",
        &format!("/api/messages/with/{}?limit=10", alice_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["is_deleted"], true);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let (_dir, _state, app) = app().await;
    let (alice, _) = signup(&app, "Alice").await;
    let (_, bob_id) = signup(&app, "Bob").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/messages",
        Some(&alice),
        Some(json!({ "to": bob_id, "body": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["body"].is_string());
}

#[tokio::test]
async fn test_room_history_route() {
    let (_dir, _state, app) = app().await;
    let (alice, _) = signup(&app, "Alice").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/messages",
        Some(&alice),
        Some(json!({ "room": "physics-101", "body": "exam moved" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, history) = call(&app, "GET", "/api/chat/rooms/physics-101/messages", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["room_id"], "physics-101");
    assert_eq!(history[0]["addressing"], "room");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let (_dir, state, app) = app().await;
    let (admin, _) = signup(&app, "Root").await;
    let (student, student_id) = signup(&app, "Student").await;

    let (status, _) = call(&app, "GET", "/api/admin/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        "/api/books",
        Some(&student),
        Some(json!({ "title": "Calculus" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    state.auth.promote_admin_by_email("root@uni.edu").await.unwrap();

    let (status, book) = call(
        &app,
        "POST",
        "/api/books",
        Some(&admin),
        Some(json!({ "title": "Calculus", "category": "Math", "file_url": "https://files.example.com/calc.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{book}");

    let (status, books) = call(&app, "GET", "/api/books?category=math", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().unwrap().len(), 1);

    let (status, stats) = call(&app, "GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"], 2);
    assert_eq!(stats["admins"], 1);
    assert_eq!(stats["books"], 1);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/admin/users/{}/deactivate", student_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Deactivation revoked the student's session
    let (status, _) = call(&app, "GET", "/api/auth/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_book_is_404() {
    let (_dir, _state, app) = app().await;
    let (token, _) = signup(&app, "Ada").await;

    let (status, body) = call(&app, "GET", "/api/books/missing", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Book not found");
}

#[tokio::test]
async fn test_malformed_input_gets_json_400() {
    let (_dir, _state, app) = app().await;
    let (token, _) = signup(&app, "Ada").await;
    let (_, bob_id) = signup(&app, "Bob").await;

    let (status, body) = call(
        &app,
        "PUT",
        "/api/users/me/status",
        Some(&token),
        Some(json!({ "status": "busy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string(), "{body}");

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/messages/with/{}?before=yesterday", bob_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string(), "{body}");

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/messages/with/{}?limit=0", bob_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["limit"].is_string(), "{body}");

    let (status, body) = call(
        &app,
        "PUT",
        "/api/users/me/status",
        Some(&token),
        Some(json!({ "status": "away" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "away");
}

#[tokio::test]
async fn test_non_admin_write_is_forbidden_before_validation() {
    let (_dir, _state, app) = app().await;
    let (student, _) = signup(&app, "Student").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/books",
        Some(&student),
        Some(json!({ "title": "", "file_url": "ftp://nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "PUT",
        "/api/videos/whatever",
        Some(&student),
        Some(json!({ "duration_secs": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deactivation_drops_live_connection() {
    let (_dir, state, app) = app().await;
    let (admin, _) = signup(&app, "Root").await;
    let (_, student_id) = signup(&app, "Student").await;
    state.auth.promote_admin_by_email("root@uni.edu").await.unwrap();

    let (_, mut events) = state.presence.connect(&student_id);
    assert!(state.presence.is_online(&student_id));

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/admin/users/{}/deactivate", student_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);
    assert_eq!(body["status"], "offline");

    assert!(!state.presence.is_online(&student_id));
    while events.try_recv().is_ok() {}
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
}
