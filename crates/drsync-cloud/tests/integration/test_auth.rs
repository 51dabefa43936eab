//! Integration tests for the OAuth token exchange and refresh

use std::time::Duration;

use drsync_cloud::{Endpoints, OAuthSession};
use drsync_core::domain::BackendKind;
use drsync_core::ports::{AuthError, Credential, IAuthSession, RefreshOutcome};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, backend: BackendKind) -> OAuthSession {
    OAuthSession::with_endpoints(
        backend,
        &Credential::new("app-key", Some("app-secret".to_string())),
        None,
        Endpoints::local(backend, &server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn token_error(error: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "error": error,
        "error_description": "denied"
    }))
}

#[tokio::test]
async fn test_exchange_code_returns_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=pasted-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": 14400,
            "refresh_token": "refresh-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = session(&server, BackendKind::Dropbox)
        .exchange_code("  pasted-code\n")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.token_type, "bearer");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert!(tokens.expires_at.is_some());
    assert!(!tokens.is_expired());
}

#[tokio::test]
async fn test_exchange_code_invalid_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_error("invalid_grant"))
        .mount(&server)
        .await;

    let err = session(&server, BackendKind::Drive)
        .exchange_code("stale")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant(_)), "got {err:?}");
}

#[tokio::test]
async fn test_exchange_code_other_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_error("invalid_client"))
        .mount(&server)
        .await;

    let err = session(&server, BackendKind::Dropbox)
        .exchange_code("code")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Rejected(_)), "got {err:?}");
}

#[tokio::test]
async fn test_exchange_code_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("{\"unexpected\": true}"),
        )
        .mount(&server)
        .await;

    let err = session(&server, BackendKind::Dropbox)
        .exchange_code("code")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-2",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = session(&server, BackendKind::Drive)
        .refresh("refresh-1")
        .await
        .unwrap();

    match outcome {
        RefreshOutcome::Refreshed(tokens) => {
            assert_eq!(tokens.access_token, "access-2");
            assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        }
        RefreshOutcome::Expired => panic!("expected refreshed tokens"),
    }
}

#[tokio::test]
async fn test_refresh_uses_rotated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-3",
            "token_type": "bearer",
            "refresh_token": "refresh-2"
        })))
        .mount(&server)
        .await;

    let outcome = session(&server, BackendKind::Dropbox)
        .refresh("refresh-1")
        .await
        .unwrap();

    let RefreshOutcome::Refreshed(tokens) = outcome else {
        panic!("expected refreshed tokens");
    };
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));
    assert!(tokens.expires_at.is_none());
}

#[tokio::test]
async fn test_refresh_invalid_grant_means_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_error("invalid_grant"))
        .mount(&server)
        .await;

    let outcome = session(&server, BackendKind::Drive)
        .refresh("revoked")
        .await
        .unwrap();
    assert_eq!(outcome, RefreshOutcome::Expired);
}

#[tokio::test]
async fn test_refresh_transport_failure_is_an_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let session = OAuthSession::with_endpoints(
        BackendKind::Dropbox,
        &Credential::new("app-key", None),
        None,
        Endpoints::local(BackendKind::Dropbox, &uri),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = session.refresh("refresh-1").await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_connected_client_uses_session_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/users/get_current_account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": {"display_name": "Dee Box"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let session = session(&server, BackendKind::Dropbox);
    let tokens = session.exchange_code("code").await.unwrap();
    let client = session.connect(&tokens).unwrap();

    assert_eq!(client.backend(), BackendKind::Dropbox);
    assert_eq!(client.account_info().await.unwrap().display_name, "Dee Box");
}
