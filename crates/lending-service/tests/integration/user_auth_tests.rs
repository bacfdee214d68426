//! Registration, login, token refresh and account tests.

use common::secret::SecretString;
use lending_service::auth::TokenType;
use lending_service::errors::LendingError;
use lending_service::models::{
    IsUserExistRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, RegisterStatusCode,
    RegisterUserDetail, Role, UserStatus,
};
use lending_service::repositories::UserStore;
use lending_test_utils::*;

fn registration(email: &str, phone_number: &str, role_id: u8) -> RegisterRequest {
    RegisterRequest {
        user: RegisterUserDetail {
            name: "Rina".to_string(),
            email: email.to_string(),
            phone_number: phone_number.to_string(),
            password: SecretString::from(TEST_PASSWORD),
            role_id,
        },
    }
}

fn login(user_id: &str, password: &str, remember_me: bool) -> LoginRequest {
    LoginRequest {
        user_id: user_id.to_string(),
        password: SecretString::from(password),
        remember_me,
    }
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_self_registration_creates_borrower_with_normalised_phone() {
    let app = TestLendingApp::new();

    // Asking for ADMIN without a caller still yields a borrower.
    let response = app
        .auth
        .register(None, registration("rina@example.com", "0812-3456 789", 2))
        .await
        .unwrap();

    assert_eq!(response.code, RegisterStatusCode::Succeed);
    assert!(response.reasons.is_empty());

    let user = app
        .user_store
        .get_user_by_identifier("rina@example.com")
        .await
        .unwrap();
    assert_eq!(user.role, Role::Borrower);
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.phone_number, "+628123456789");
    assert_ne!(user.password_hash, TEST_PASSWORD);
    assert_eq!(app.user_store.audit(user.id).await, Some((None, None)));
}

#[tokio::test]
async fn test_registration_reports_taken_identifiers() {
    let app = TestLendingApp::new();
    app.user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;

    let response = app
        .auth
        .register(None, registration("ina@example.com", "0811000003", 0))
        .await
        .unwrap();

    assert_eq!(response.code, RegisterStatusCode::Failed);
    assert_eq!(
        response.reasons,
        vec![
            "user with email ina@example.com already exist".to_string(),
            "user with phone number +62811000003 already exist".to_string(),
        ]
    );
    assert_eq!(app.user_store.count().await, 1);
}

#[tokio::test]
async fn test_registration_input_errors() {
    let app = TestLendingApp::new();

    let malformed = app
        .auth
        .register(None, registration("not-an-email", "0812345678", 0))
        .await;
    assert!(matches!(malformed, Err(LendingError::MalformedEmail)));

    let mut weak = registration("weak@example.com", "0812345678", 0);
    weak.user.password = SecretString::from("password");
    assert!(matches!(
        app.auth.register(None, weak).await,
        Err(LendingError::PasswordTooWeak)
    ));

    let mut nameless = registration("anon@example.com", "0812345678", 0);
    nameless.user.name = "  ".to_string();
    assert!(matches!(
        app.auth.register(None, nameless).await,
        Err(LendingError::Validation(_))
    ));
}

#[tokio::test]
async fn test_admin_registers_admin_and_audit_records_creator() {
    let app = TestLendingApp::new();
    let admin = app
        .user_store
        .seed_user(Role::Admin, "ada@example.com", "+62811000005")
        .await;
    let caller = app.claims_for(&admin);

    let response = app
        .auth
        .register(
            Some(&caller),
            registration("new.admin@example.com", "0813000001", Role::Admin.id()),
        )
        .await
        .unwrap();
    assert_eq!(response.code, RegisterStatusCode::Succeed);

    let created = app
        .user_store
        .get_user_by_identifier("new.admin@example.com")
        .await
        .unwrap();
    assert_eq!(created.role, Role::Admin);
    assert_eq!(
        app.user_store.audit(created.id).await,
        Some((Some(admin.id), None))
    );

    // ADMIN may not mint a SUPERADMIN.
    let escalation = app
        .auth
        .register(
            Some(&caller),
            registration("boss@example.com", "0813000002", Role::Superadmin.id()),
        )
        .await;
    assert!(matches!(escalation, Err(LendingError::PermissionDenied)));
}

#[tokio::test]
async fn test_non_admin_caller_cannot_register_users() {
    let app = TestLendingApp::new();
    let investor = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;

    let result = app
        .auth
        .register(
            Some(&app.claims_for(&investor)),
            registration("friend@example.com", "0813000003", Role::Investor.id()),
        )
        .await;

    assert!(matches!(result, Err(LendingError::PermissionDenied)));
}

// ============================================================================
// Login and refresh
// ============================================================================

#[tokio::test]
async fn test_login_by_email_and_by_local_phone_number() {
    let app = TestLendingApp::new();
    let user = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;

    for identifier in ["ina@example.com", "0811-000-003"] {
        let tokens = app.auth.login(login(identifier, TEST_PASSWORD, false)).await.unwrap();

        let access = app
            .verifier
            .verify(&tokens.access_token, TokenType::Access)
            .await
            .unwrap();
        assert_eq!(access.user_id, user.id);
        assert_eq!(access.role_id, Role::Investor);
        assert_eq!(access.sub, "ina@example.com");
        assert_eq!(access.iss, TEST_ACCESS_ISSUER);

        let refresh = app
            .verifier
            .verify(&tokens.refresh_token, TokenType::Refresh)
            .await
            .unwrap();
        assert!(!refresh.extended);
        assert_eq!(refresh.iss, TEST_REFRESH_ISSUER);
    }
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestLendingApp::new();
    let blocked = app
        .user_store
        .seed_user(Role::Borrower, "bob@example.com", "+62811000009")
        .await;
    app.user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    app.user_store
        .set_status(blocked.id, UserStatus::Blocked)
        .await;

    assert!(matches!(
        app.auth.login(login("ina@example.com", "Wrong-pass1", false)).await,
        Err(LendingError::InvalidCredentials)
    ));
    assert!(matches!(
        app.auth.login(login("nobody@example.com", TEST_PASSWORD, false)).await,
        Err(LendingError::UserNotFound)
    ));
    assert!(matches!(
        app.auth.login(login("bob@example.com", TEST_PASSWORD, false)).await,
        Err(LendingError::UserIsNotActive)
    ));
    assert!(matches!(
        app.auth.login(login("ina@example.com", "short", false)).await,
        Err(LendingError::Validation(_))
    ));
    assert!(matches!(
        app.auth.login(login("   ", TEST_PASSWORD, false)).await,
        Err(LendingError::Validation(_))
    ));
}

#[tokio::test]
async fn test_refresh_keeps_remember_me_and_rejects_access_tokens() {
    let app = TestLendingApp::new();
    let user = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    let tokens = app
        .auth
        .login(login("ina@example.com", TEST_PASSWORD, true))
        .await
        .unwrap();

    let refreshed = app
        .auth
        .refresh_token(RefreshTokenRequest {
            refresh_token: SecretString::from(tokens.refresh_token.clone()),
        })
        .await
        .unwrap();
    let claims = app
        .verifier
        .verify(&refreshed.refresh_token, TokenType::Refresh)
        .await
        .unwrap();
    assert!(claims.extended);
    assert_eq!(claims.user_id, user.id);

    let wrong_type = app
        .auth
        .refresh_token(RefreshTokenRequest {
            refresh_token: SecretString::from(tokens.access_token),
        })
        .await;
    assert!(matches!(wrong_type, Err(LendingError::InvalidToken(_))));

    let empty = app
        .auth
        .refresh_token(RefreshTokenRequest {
            refresh_token: SecretString::from(""),
        })
        .await;
    assert!(matches!(empty, Err(LendingError::Validation(_))));
}

// ============================================================================
// Existence checks and account closure
// ============================================================================

#[tokio::test]
async fn test_is_user_exist() {
    let app = TestLendingApp::new();
    app.user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;

    let by_phone = app
        .users
        .is_user_exist(IsUserExistRequest {
            email: String::new(),
            phone_number: "0811000003".to_string(),
        })
        .await
        .unwrap();
    assert!(by_phone.is_exist);
    assert_eq!(
        by_phone.reasons,
        vec!["user with phone number +62811000003 already exist".to_string()]
    );

    let unknown = app
        .users
        .is_user_exist(IsUserExistRequest {
            email: "new@example.com".to_string(),
            phone_number: String::new(),
        })
        .await
        .unwrap();
    assert!(!unknown.is_exist);
    assert!(unknown.reasons.is_empty());

    // Phone numbers under four characters count as absent.
    assert!(matches!(
        app.users
            .is_user_exist(IsUserExistRequest {
                email: String::new(),
                phone_number: "081".to_string(),
            })
            .await,
        Err(LendingError::NoArgument)
    ));
    assert!(matches!(
        app.users
            .is_user_exist(IsUserExistRequest {
                email: "broken@".to_string(),
                phone_number: String::new(),
            })
            .await,
        Err(LendingError::MalformedEmail)
    ));
}

#[tokio::test]
async fn test_closed_account_cannot_log_in_and_frees_identifiers() {
    let app = TestLendingApp::new();
    let user = app
        .user_store
        .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
        .await;

    let closed = app
        .users
        .close_account(Some(&app.claims_for(&user)))
        .await
        .unwrap();
    assert_eq!(closed.user_id, user.id);
    assert_eq!(closed.status, UserStatus::Closed);
    assert_eq!(
        app.user_store.audit(user.id).await,
        Some((None, Some(user.id)))
    );

    assert!(matches!(
        app.auth.login(login("bella@example.com", TEST_PASSWORD, false)).await,
        Err(LendingError::UserIsNotActive)
    ));

    let again = app
        .auth
        .register(None, registration("bella@example.com", "0811000001", 0))
        .await
        .unwrap();
    assert_eq!(again.code, RegisterStatusCode::Succeed);
    app.auth
        .login(login("bella@example.com", TEST_PASSWORD, false))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_close_account_requires_known_caller() {
    let app = TestLendingApp::new();

    assert!(matches!(
        app.users.close_account(None).await,
        Err(LendingError::Unauthenticated)
    ));

    let ghost = TestClaimsBuilder::new(Role::Borrower)
        .user_id(UNKNOWN_USER_ID)
        .build();
    assert!(matches!(
        app.users.close_account(Some(&ghost)).await,
        Err(LendingError::UserNotFound)
    ));
}
