// Integration tests for the linking API surface

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use tower::ServiceExt;

use kassa::api::{create_link_router, LinkAppState};
use kassa::credentials::CredentialStore;
use kassa::link::AttemptTracker;
use kassa::oauth::{AuthState, ServiceConfig, TokenGrant};
use kassa::platform::Platform;
use kassa::session::SessionRegistry;

fn create_test_app() -> (Router, Arc<SessionRegistry>) {
    let key = BASE64.encode([0u8; 32]);
    let store = Arc::new(CredentialStore::new(":memory:", &key).unwrap());
    let registry = Arc::new(SessionRegistry::new(store, 60));

    let app = create_link_router(LinkAppState {
        registry: registry.clone(),
        attempts: AttemptTracker::new(600),
        http: reqwest::Client::new(),
    });
    (app, registry)
}

fn authorized_state() -> AuthState {
    let mut state = AuthState::from_config(ServiceConfig {
        auth_url: "https://example.com/authorize".to_string(),
        token_url: "https://example.com/token".to_string(),
        client_id: "client".to_string(),
        redirect_uri: "app://callback".to_string(),
        scope: String::new(),
    });
    state.update_after_token_response(&TokenGrant {
        access_token: "at".to_string(),
        refresh_token: None,
        id_token: None,
        expires_at: None,
    });
    state
}

#[tokio::test]
async fn test_list_accounts_empty() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["accounts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_accounts_reports_linked() {
    let (app, registry) = create_test_app();
    registry
        .handle(Platform::Appie, 42)
        .replace(authorized_state())
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let accounts = json["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["platform"], "appie");
    assert_eq!(accounts[0]["account_id"], 42);
    assert_eq!(accounts[0]["authorized"], true);
}

#[tokio::test]
async fn test_link_start_redirects_to_provider() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/link/lidl")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("https://accounts.lidl.com/connect/authorize?"));
    assert!(location.contains("client_id=LidlPlusNativeClient"));
    assert!(location.contains("code_challenge_method=S256"));
}

#[tokio::test]
async fn test_link_start_unknown_platform() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/link/dirk")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_start_rejects_password_platform() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/link/wbw")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_unknown_state_reports_failure() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/link/callback?code=abc&state=never-issued")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["outcome"], "failed");
}

#[tokio::test]
async fn test_unlink_account() {
    let (app, registry) = create_test_app();
    registry
        .handle(Platform::Lidl, 0)
        .replace(authorized_state())
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/accounts/lidl/0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(registry.linked_accounts().unwrap().is_empty());
    // The next load seeds a fresh unauthorized state.
    assert!(!registry.handle(Platform::Lidl, 0).current().await.is_authorized());

    // Unlinking again is a no-op.
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/accounts/lidl/0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unlink_unknown_platform() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/accounts/dirk/0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
