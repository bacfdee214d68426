//! HTTP surface tests: health checks, JWKS, metrics and the JSON gateway.
//!
//! Each test spawns a real listener and talks to it with reqwest.

use lending_service::models::Role;
use lending_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

// ============================================================================
// Health and public endpoints
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_ready_endpoint_follows_database_and_shutdown_state() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let url = format!("{}/ready", server.url());

    let response = reqwest::get(&url).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "READY");

    app.ledger.set_unavailable(true);
    let response = reqwest::get(&url).await?;
    assert_eq!(
        response.status(),
        StatusCode::SERVICE_UNAVAILABLE,
        "Readiness should fail while the database is unreachable"
    );

    app.ledger.set_unavailable(false);
    app.health.set_not_ready();
    let response = reqwest::get(&url).await?;
    assert_eq!(
        response.status(),
        StatusCode::SERVICE_UNAVAILABLE,
        "Readiness should fail once shutdown has begun"
    );

    let response = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Liveness should hold while the process keeps serving"
    );
    Ok(())
}

#[tokio::test]
async fn test_http_responses_carry_request_id() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/health", server.url())).send().await?;
    let generated = response
        .headers()
        .get("x-request-id")
        .expect("generated request id")
        .to_str()?;
    assert_eq!(generated.len(), 36, "Generated id should be a UUID");

    let response = client
        .get(format!("{}/health", server.url()))
        .header("x-request-id", "trace-me-123")
        .send()
        .await?;
    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"trace-me-123"[..]),
        "Caller supplied id should be echoed back"
    );
    Ok(())
}

#[tokio::test]
async fn test_jwks_endpoint_publishes_every_configured_key() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;

    let response = reqwest::get(format!("{}/.well-known/jwks.json", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("public, max-age=3600")
    );

    let body: Value = response.json().await?;
    let keys = body["keys"].as_array().expect("keys array");
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0]["kid"], TEST_KEY_ID_1);
    assert_eq!(keys[0]["kty"], "RSA");
    assert_eq!(keys[0]["alg"], "RS256");
    assert_eq!(keys[0]["use"], "sig");
    assert_eq!(keys[0]["e"], "AQAB");
    assert_eq!(keys[0]["n"], SIGNING_KEY_1_MODULUS);
    assert_eq!(keys[1]["kid"], TEST_KEY_ID_2);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_renders() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

// ============================================================================
// JSON gateway
// ============================================================================

#[tokio::test]
async fn test_register_then_login_over_json() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/v1/auth/register", server.url()))
        .json(&json!({
            "user": {
                "name": "Rina",
                "email": "rina@example.com",
                "phone_number": "0812345678",
                "password": TEST_PASSWORD,
            }
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "SUCCEED");

    let response = client
        .post(format!("{}/v1/auth/login", server.url()))
        .json(&json!({ "user_id": "0812345678", "password": TEST_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn test_protected_route_requires_a_valid_token() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/v1/loans", server.url());
    let body = json!({ "principal_amount": "5000" });

    let anonymous = client.post(&url).json(&body).send().await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let error: Value = anonymous.json().await?;
    assert_eq!(error["error"]["code"], "UNAUTHENTICATED");

    let garbage = client
        .post(&url)
        .bearer_auth("not.a.jwt")
        .json(&body)
        .send()
        .await?;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    let error: Value = garbage.json().await?;
    assert_eq!(error["error"]["code"], "INVALID_TOKEN");
    assert_eq!(error["error"]["message"], "Invalid/expired token");

    let wrong_scheme = client
        .post(&url)
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .json(&body)
        .send()
        .await?;
    assert_eq!(wrong_scheme.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_loan_flow_over_json() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let client = reqwest::Client::new();
    let borrower = app
        .user_store
        .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
        .await;
    let validator = app
        .user_store
        .seed_user(Role::FieldValidator, "vic@example.com", "+62811000002")
        .await;
    let investor = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    let admin = app
        .user_store
        .seed_user(Role::Admin, "ada@example.com", "+62811000005")
        .await;

    // Propose
    let response = client
        .post(format!("{}/v1/loans", server.url()))
        .bearer_auth(app.access_token_for(&borrower))
        .json(&json!({ "principal_amount": "2000" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await?;
    assert_eq!(body["state"], "PROPOSED");
    let loan_id = body["loan_id"].as_i64().expect("numeric loan id");

    // Approve; the path id wins over the body
    let response = client
        .post(format!("{}/v1/loans/{loan_id}/approve", server.url()))
        .bearer_auth(app.access_token_for(&validator))
        .json(&json!({
            "loan_id": UNKNOWN_LOAN_ID,
            "photo_proof_link": TEST_PHOTO_PROOF_LINK,
            "interest_rate": "10",
            "roi": "11.25",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["state"], "APPROVED");
    assert_eq!(body["loan_id"], loan_id);

    // An investment under the minimum is a business-rule failure
    let invest_url = format!("{}/v1/loans/{loan_id}/invest", server.url());
    let response = client
        .post(&invest_url)
        .bearer_auth(app.access_token_for(&investor))
        .json(&json!({ "amount": "500" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVESTMENT_AMOUNT_OUT_OF_RANGE");

    let response = client
        .post(&invest_url)
        .bearer_auth(app.access_token_for(&investor))
        .json(&json!({ "amount": "2000" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["state"], "INVESTED");

    // The investor may not disburse; an admin may
    let disburse_url = format!("{}/v1/loans/{loan_id}/disburse", server.url());
    let disburse_body = json!({ "signed_agreement_link": TEST_AGREEMENT_LINK });
    let response = client
        .post(&disburse_url)
        .bearer_auth(app.access_token_for(&investor))
        .json(&disburse_body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(&disburse_url)
        .bearer_auth(app.access_token_for(&admin))
        .json(&disburse_body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["state"], "DISBURSED");
    Ok(())
}

#[tokio::test]
async fn test_user_exists_without_arguments_is_unprocessable() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/v1/users/exists", server.url()))
        .json(&json!({}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NO_ARGUMENT");
    assert_eq!(body["error"]["message"], "No argument given");
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/v1/auth/login", server.url());

    let broken = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{\"user_id\": ")
        .send()
        .await?;
    let wrong_type = client
        .post(&url)
        .json(&json!({ "user_id": 42, "password": TEST_PASSWORD }))
        .send()
        .await?;
    let no_content_type = client.post(&url).body("{}").send().await?;

    for response in [broken, wrong_type, no_content_type] {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await?;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"]
            .as_str()
            .is_some_and(|m| !m.is_empty()));
    }
    Ok(())
}

#[tokio::test]
async fn test_expired_and_refresh_tokens_are_not_access_tokens() -> Result<(), anyhow::Error> {
    let app = TestLendingApp::new();
    let server = TestLendingServer::spawn(&app).await?;
    let borrower = app
        .user_store
        .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
        .await;
    let client = reqwest::Client::new();
    let url = format!("{}/v1/loans", server.url());

    let expired = app
        .issuer
        .sign(&TestClaimsBuilder::for_user(&borrower).expired().build())?;
    let refresh = app
        .issuer
        .sign(&TestClaimsBuilder::for_user(&borrower).refresh(false).build())?;

    for token in [expired, refresh] {
        let response = client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "principal_amount": "5000" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(app.ledger.loan(1).await.is_none(), "no loan was created");
    Ok(())
}
