use super::*;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn auth_for(server: &MockServer) -> FirebaseAuth {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseAuth::new_with_client(
        client,
        server.url("/v1"),
        "test-key".to_string(),
        SessionState::new(),
    )
}

#[tokio::test]
async fn test_create_account() {
    let server = MockServer::start();
    let auth = auth_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:signUp")
            .query_param("key", "test-key")
            .header("content-type", "application/json")
            .json_body(json!({
                "email": "ana@example.com",
                "password": "secret123",
                "returnSecureToken": true
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "idToken": "id-token",
                "email": "ana@example.com",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "localId": "uid-ana"
            }));
    });

    let session = auth.create_account("ana@example.com", "secret123").await.unwrap();

    mock.assert();
    assert_eq!(session.uid, "uid-ana");
    assert_eq!(session.email, "ana@example.com");
    assert_eq!(session.display_name, None);
    assert_eq!(session.expires_in, Some(3600));
    assert_eq!(auth.current_session(), Some(session));
}

#[tokio::test]
async fn test_authenticate_keeps_display_name() {
    let server = MockServer::start();
    let auth = auth_for(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:signInWithPassword")
            .query_param("key", "test-key");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "localId": "uid-ana",
                "email": "ana@example.com",
                "displayName": "Ana",
                "idToken": "id-token",
                "registered": true,
                "refreshToken": "refresh-token",
                "expiresIn": "3600"
            }));
    });

    let session = auth.authenticate("ana@example.com", "secret123").await.unwrap();

    mock.assert();
    assert_eq!(session.display_name.as_deref(), Some("Ana"));
    assert_eq!(session.sender_name(), "Ana");
}

#[tokio::test]
async fn test_provider_error_is_user_facing() {
    let server = MockServer::start();
    let auth = auth_for(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signUp");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 400,
                    "message": "EMAIL_EXISTS",
                    "errors": [{ "message": "EMAIL_EXISTS", "domain": "global", "reason": "invalid" }]
                }
            }));
    });

    let err = auth.create_account("ana@example.com", "secret123").await.unwrap_err();

    assert_eq!(err.code(), Some("auth/email-already-in-use"));
    assert_eq!(err.to_string(), "Firebase: Error (auth/email-already-in-use).");
    assert_eq!(auth.current_session(), None);
}

#[tokio::test]
async fn test_unparseable_error_becomes_api_error() {
    let server = MockServer::start();
    let auth = auth_for(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(502).body("bad gateway");
    });

    let err = auth.authenticate("ana@example.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::ApiError(ref msg) if msg.contains("bad gateway")));
}

#[tokio::test]
async fn test_sign_out_notifies_subscribers() {
    let server = MockServer::start();
    let auth = auth_for(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(200).json_body(json!({
            "localId": "uid-ana",
            "email": "ana@example.com",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        }));
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = auth.subscribe_session_changes(Arc::new(move |s: Option<Session>| {
        sink.lock().unwrap().push(s.is_some());
    }));

    auth.authenticate("ana@example.com", "pw").await.unwrap();
    auth.sign_out().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
}

#[test]
fn test_weak_password_detail_is_kept() {
    let err = provider_error("WEAK_PASSWORD : Password should be at least 6 characters");
    assert_eq!(err.code(), Some("auth/weak-password"));
    assert_eq!(
        err.to_string(),
        "Firebase: Password should be at least 6 characters (auth/weak-password)."
    );
}

#[test]
fn test_unknown_code_maps_to_internal_error() {
    let err = provider_error("SOMETHING_NEW");
    assert_eq!(err.code(), Some("auth/internal-error"));
}
