use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tether::auth::{CredentialError, HttpRefreshExchange, RefreshExchange, RefreshedTokens};

fn exchange(server: &MockServer) -> HttpRefreshExchange {
    HttpRefreshExchange::new(&format!("{}/api/v1", server.uri()), "/auth/refresh/")
}

#[tokio::test]
async fn envelope_response_yields_rotated_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "code": 200,
            "message": "ok",
            "data": {"token": "T2", "refresh_token": "R2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = exchange(&server).exchange("R1").await.expect("exchange");
    assert_eq!(
        tokens,
        RefreshedTokens {
            access_token: "T2".into(),
            refresh_token: Some("R2".into()),
        }
    );
}

#[tokio::test]
async fn bare_response_keeps_current_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "T2"})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = exchange(&server).exchange("R1").await.expect("exchange");
    assert_eq!(tokens.access_token, "T2");
    assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
async fn rejected_refresh_token_is_a_denial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = exchange(&server).exchange("R1").await.unwrap_err();
    assert!(matches!(err, CredentialError::RefreshDenied(body) if body.contains("blacklisted")));
}

#[tokio::test]
async fn server_failure_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let err = exchange(&server).exchange("R1").await.unwrap_err();
    assert!(matches!(err, CredentialError::InvalidResponse(ref message) if message.contains("502")));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unsuccessful_envelope_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": 4002,
            "message": "refresh token invalid"
        })))
        .mount(&server)
        .await;

    let err = exchange(&server).exchange("R1").await.unwrap_err();
    assert_eq!(
        err,
        CredentialError::InvalidResponse("refresh token invalid".into())
    );
}

#[tokio::test]
async fn slow_refresh_endpoint_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "T2"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = exchange(&server)
        .with_timeout(Duration::from_millis(50))
        .exchange("R1")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
