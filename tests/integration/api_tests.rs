//! API integration tests
//!
//! Drive the real router in-process over the in-memory repository.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, LoansConfig, LoggingConfig, ServerConfig,
        StorageBackend, StorageConfig,
    },
    repository::Repository,
    AppState,
};

fn test_app() -> Router {
    let config = AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        auth: AuthConfig {
            jwt_secret: "integration-test-secret".to_string(),
            jwt_expiration_hours: 24,
        },
        loans: LoansConfig::default(),
        logging: LoggingConfig::default(),
    };
    api::router(AppState::new(&config, Repository::in_memory()))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri));
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
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({ "name": "Alice", "email": email, "password": "Secret123" })),
    )
    .await
}

async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": email, "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn add_book(app: &Router, token: &str, title: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/books",
        Some(token),
        Some(json!({ "title": title, "author": "Alice", "publication_year": 2024 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = test_app();

    let (status, body) = register(&app, "alice@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("password").is_none());

    let (status, body) = register(&app, "alice@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already exists");

    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["member"]["id"], 1);
}

#[tokio::test]
async fn test_login_failures_share_one_response() {
    let app = test_app();
    register(&app, "alice@example.com").await;

    let (wrong_status, wrong_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "Secret123" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["message"], "Invalid email or password");

    let (status, _) = send(&app, "POST", "/login", None, Some(json!({ "email": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validation() {
    let app = test_app();

    let (status, _) = register(&app, "not-an-email").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "name": "", "email": "a@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guard_rejects_missing_and_bad_tokens() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/loans/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");

    let (status, body) = send(&app, "GET", "/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidToken");

    let (status, _) = send(
        &app,
        "POST",
        "/books",
        None,
        Some(json!({ "title": "Dune", "author": "Frank Herbert" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Catalog reads stay public
    let (status, body) = send(&app, "GET", "/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let app = test_app();
    register(&app, "alice@example.com").await;
    let token = login(&app, "alice@example.com").await;
    let book_id = add_book(&app, &token, "Go Programming").await;

    let (status, loan) = send(
        &app,
        "POST",
        "/loans",
        Some(&token),
        Some(json!({ "member_id": 1, "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["id"], 1);
    assert_eq!(loan["returned"], false);
    assert_eq!(loan["is_overdue"], false);
    assert_eq!(loan["status"], "active");
    assert!(loan["return_date"].is_null());
    assert_eq!(
        timestamp(&loan["due_date"]) - timestamp(&loan["borrow_date"]),
        Duration::days(14)
    );

    let (status, _) = send(
        &app,
        "POST",
        "/loans",
        Some(&token),
        Some(json!({ "member_id": 1, "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, returned) = send(
        &app,
        "PUT",
        "/loans/1",
        Some(&token),
        Some(json!({ "returned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["returned"], true);
    assert_eq!(returned["status"], "returned");
    assert!(returned["return_date"].is_string());

    let (status, body) = send(&app, "POST", "/loans/1/return", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Loan with id 1 already returned");

    let (status, again) = send(&app, "GET", "/loans/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["return_date"], returned["return_date"]);

    let (status, mine) = send(&app, "GET", "/me/loans", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_loan_references_must_exist() {
    let app = test_app();
    register(&app, "alice@example.com").await;
    let token = login(&app, "alice@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/loans",
        Some(&token),
        Some(json!({ "member_id": 1, "book_id": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/loans/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/members/42/loans", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_report() {
    let app = test_app();
    register(&app, "alice@example.com").await;
    let token = login(&app, "alice@example.com").await;
    let book_id = add_book(&app, &token, "Go Programming").await;
    send(
        &app,
        "POST",
        "/loans",
        Some(&token),
        Some(json!({ "member_id": 1, "book_id": book_id })),
    )
    .await;

    let today = Utc::now().date_naive();
    let uri = format!(
        "/admin/reports?start_date={}&end_date={}",
        today.format("%Y-%m-%d"),
        (today + Duration::days(30)).format("%Y-%m-%d")
    );
    let (status, report) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_loans"], 1);
    assert_eq!(report["active_loans"], 1);
    assert_eq!(report["overdue_loans"], 0);
    assert_eq!(report["loans"][0]["id"], 1);

    let (status, _) = send(
        &app,
        "GET",
        "/admin/reports?start_date=2024-13-01&end_date=2024-12-31",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, dashboard) = send(&app, "GET", "/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["total_members"], 1);
    assert_eq!(dashboard["total_books"], 1);
    assert_eq!(dashboard["active_loans"], 1);
}

#[tokio::test]
async fn test_reviews_update_book_rating() {
    let app = test_app();
    register(&app, "alice@example.com").await;
    let token = login(&app, "alice@example.com").await;
    let book_id = add_book(&app, &token, "Dune").await;

    let (status, review) = send(
        &app,
        "POST",
        "/reviews",
        Some(&token),
        Some(json!({ "book_id": book_id, "rating": 4, "comment": "Great" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["member_id"], 1);

    let (status, book) = send(&app, "GET", &format!("/books/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["rating"], 4.0);

    let (status, reviews) =
        send(&app, "GET", &format!("/books/{}/reviews", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviews.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_notifications_for_current_member() {
    let app = test_app();
    register(&app, "alice@example.com").await;
    let token = login(&app, "alice@example.com").await;

    let (status, created) = send(
        &app,
        "POST",
        "/notifications",
        Some(&token),
        Some(json!({ "member_id": 1, "title": "Welcome", "message": "Card ready" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, count) = send(&app, "GET", "/notifications/unread/count", Some(&token), None).await;
    assert_eq!(count["unread"], 1);

    let uri = format!("/notifications/{}/read", created["id"]);
    let (status, read) = send(&app, "PUT", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], true);

    let (_, count) = send(&app, "GET", "/notifications/unread/count", Some(&token), None).await;
    assert_eq!(count["unread"], 0);
}
