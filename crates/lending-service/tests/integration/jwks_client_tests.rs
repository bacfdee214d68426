//! Remote JWKS verification against a mock key server.

use lending_service::auth::{
    JwksClient, KeySource, TokenIssuer, TokenSubject, TokenType, TokenVerifier,
};
use lending_service::errors::LendingError;
use lending_service::models::Role;
use lending_test_utils::*;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

fn subject() -> TokenSubject {
    TokenSubject {
        user_id: 42,
        name: "Ina".to_string(),
        email: "ina@example.com".to_string(),
        phone_number: "+62811000003".to_string(),
        role: Role::Investor,
    }
}

/// Serve this service's own JWKS from a mock server.
async fn mock_key_server(app: &TestLendingApp, expected_fetches: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(&app.jwks))
        .expect(expected_fetches)
        .mount(&server)
        .await;
    server
}

fn remote_verifier(server: &MockServer) -> TokenVerifier {
    let client = JwksClient::new(
        format!("{}{JWKS_PATH}", server.uri()),
        Duration::from_secs(300),
    );
    TokenVerifier::new(
        Arc::new(client),
        TEST_ACCESS_ISSUER.to_string(),
        TEST_REFRESH_ISSUER.to_string(),
    )
}

#[tokio::test]
async fn test_tokens_verify_against_remote_keys_with_one_fetch() {
    let app = TestLendingApp::new();
    let server = mock_key_server(&app, 1).await;
    let verifier = remote_verifier(&server);

    for _ in 0..3 {
        let token = app
            .issuer
            .issue(&subject(), TokenType::Access, false)
            .unwrap();
        let claims = verifier.verify(&token, TokenType::Access).await.unwrap();
        assert_eq!(claims.user_id, 42);
    }
    // MockServer verifies the single fetch on drop.
}

#[tokio::test]
async fn test_unknown_kid_does_not_trigger_refetch() {
    let app = TestLendingApp::new();
    let server = mock_key_server(&app, 1).await;
    let client = JwksClient::new(
        format!("{}{JWKS_PATH}", server.uri()),
        Duration::from_secs(300),
    );

    client.find_key(TEST_KEY_ID_1).await.unwrap();
    let missing = client.find_key("rotated-away").await;

    assert!(matches!(missing, Err(LendingError::InvalidToken(_))));
}

#[tokio::test]
async fn test_token_signed_with_second_key_verifies() {
    let app = TestLendingApp::new();
    let server = mock_key_server(&app, 1).await;
    let verifier = remote_verifier(&server);

    // An issuer that signs with key 2 while key 1 is still published.
    let mut config = test_jwt_config();
    config.keys.reverse();
    let issuer = TokenIssuer::from_config(&config).unwrap();
    assert_eq!(issuer.kid(), TEST_KEY_ID_2);

    let token = issuer.issue(&subject(), TokenType::Access, false).unwrap();
    let claims = verifier.verify(&token, TokenType::Access).await.unwrap();

    assert_eq!(claims.role_id, Role::Investor);
}

#[tokio::test]
async fn test_key_server_error_fails_verification() {
    let app = TestLendingApp::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let verifier = remote_verifier(&server);

    let token = app
        .issuer
        .issue(&subject(), TokenType::Access, false)
        .unwrap();
    let result = verifier.verify(&token, TokenType::Access).await;

    assert!(result.is_err(), "no keys means no valid tokens");
}
