//! HTTP endpoint tests driven through the router

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use axum_extra::extract::cookie::Cookie;
use serde_json::{json, Value};
use tower::ServiceExt;

use harbory::app::options::AppOptions;
use harbory::app::state::AppState;
use harbory::server::serve::router;

use crate::support::FakeRunner;

struct TestApp {
    router: Router,
    state: AppState,
    _root: tempfile::TempDir,
}

fn test_app(runner: FakeRunner) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut options = AppOptions::default();
    options.deploy.workspace_root = root.path().to_path_buf();

    let state = AppState::with_runner(&options, Arc::new(runner));
    let router = router(Arc::new(state.server_state(&options)));
    TestApp {
        router,
        state,
        _root: root,
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body, cookie)
}

async fn login(app: &TestApp) -> String {
    let (status, body, _) = send(
        app,
        json_request(Method::POST, "/auth/login", json!({"password": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_app(FakeRunner::new());
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    assert!(body["uptime"].is_string());
}

#[tokio::test]
async fn test_login_sets_cookie() {
    let app = test_app(FakeRunner::new());

    let (status, body, cookie) = send(
        &app,
        json_request(Method::POST, "/auth/login", json!({"password": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let token = body["token"].as_str().unwrap();
    let raw = cookie.unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    assert!(raw.contains("Max-Age=86400"));

    let cookie = Cookie::parse_encoded(raw).unwrap();
    assert_eq!(cookie.name(), "harbory_token");
    assert_eq!(cookie.value(), token);

    // the browser sends the encoded form back
    let request = Request::get("/auth/verify")
        .header(header::COOKIE, cookie.encoded().stripped().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = test_app(FakeRunner::new());

    let (status, body, cookie) = send(
        &app,
        json_request(Method::POST, "/auth/login", json!({"password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"status": "Error", "error": "Invalid password"}));
    assert!(cookie.is_none());
}

#[tokio::test]
async fn test_login_malformed_body() {
    let app = test_app(FakeRunner::new());
    let request = Request::post("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "Error");
}

#[tokio::test]
async fn test_verify_with_header_and_cookie() {
    let app = test_app(FakeRunner::new());
    let token = login(&app).await;

    let request = with_bearer(Request::get("/auth/verify").body(Body::empty()).unwrap(), &token);
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session valid");

    let request = Request::get("/auth/verify")
        .header(header::COOKIE, format!("harbory_token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::get("/auth/verify").body(Body::empty()).unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = test_app(FakeRunner::new());
    let token = login(&app).await;

    let request = with_bearer(Request::post("/auth/logout").body(Body::empty()).unwrap(), &token);
    let (status, body, cookie) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");
    let cookie = Cookie::parse_encoded(cookie.unwrap()).unwrap();
    assert_eq!(cookie.name(), "harbory_token");
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));

    assert!(!app.state.sessions.validate_token(&token).await);
}

#[tokio::test]
async fn test_logout_requires_token() {
    let app = test_app(FakeRunner::new());
    let request = Request::post("/auth/logout").body(Body::empty()).unwrap();

    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "Error");
}

#[tokio::test]
async fn test_change_password_flow() {
    let app = test_app(FakeRunner::new());
    let token = login(&app).await;

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/change-password",
            json!({"old_password": "admin", "new_password": "abc"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "New password must be at least 4 characters long");

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/change-password",
            json!({"old_password": "", "new_password": "abcd"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Old password and new password are required");

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/change-password",
            json!({"old_password": "wrong", "new_password": "abcd"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid old password");
    assert!(app.state.sessions.validate_token(&token).await);

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/change-password",
            json!({"old_password": "admin", "new_password": "abcd"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password changed successfully. Please login again.");
    assert!(!app.state.sessions.validate_token(&token).await);

    let (status, _, _) = send(
        &app,
        json_request(Method::POST, "/auth/login", json!({"password": "abcd"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_deploy_requires_session() {
    let app = test_app(FakeRunner::new());
    let request = json_request(
        Method::POST,
        "/deploy",
        json!({"repo_url": "https://github.com/org/app.git", "framework": "node"}),
    );

    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"status": "Error", "error": "Unauthorized"}));
}

#[tokio::test]
async fn test_deploy_success() {
    let app = test_app(FakeRunner::new());
    let token = login(&app).await;

    let request = with_bearer(
        json_request(
            Method::POST,
            "/deploy",
            json!({
                "repo_url": "https://github.com/org/app.git",
                "has_dockerfile": false,
                "dockerfile_path": "",
                "framework": "react"
            }),
        ),
        &token,
    );
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_deploy_validation_error() {
    let app = test_app(FakeRunner::new());
    let token = login(&app).await;

    let request = with_bearer(
        json_request(
            Method::POST,
            "/deploy",
            json!({"repo_url": "https://github.com/org/app.git"}),
        ),
        &token,
    );
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "framework required when Dockerfile not provided");
}

#[tokio::test]
async fn test_deploy_pipeline_error() {
    let app = test_app(FakeRunner::new().fail("git clone", "exit status 128"));
    let token = login(&app).await;

    let request = with_bearer(
        json_request(
            Method::POST,
            "/deploy",
            json!({"repo_url": "https://github.com/org/app.git", "framework": "go"}),
        ),
        &token,
    );
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"status": "Error", "error": "git failed: exit status 128"}));
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = test_app(FakeRunner::new());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/auth/login")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_headers_on_plain_response() {
    let app = test_app(FakeRunner::new());
    let request = Request::get("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
