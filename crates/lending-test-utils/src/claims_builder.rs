//! Builders for hand-made claims.
//!
//! Services take `Option<&Claims>`, so most tests never need a signed
//! token. Use [`crate::TestLendingApp::access_token_for`] when one is.

use crate::crypto_fixtures::{TEST_ACCESS_ISSUER, TEST_REFRESH_ISSUER};
use chrono::Utc;
use lending_service::auth::{Claims, TokenType};
use lending_service::models::{Role, User, UserId};

pub struct TestClaimsBuilder {
    claims: Claims,
}

impl TestClaimsBuilder {
    /// Access claims for a fresh caller with `role`, valid for an hour.
    pub fn new(role: Role) -> Self {
        let email = format!("{}@example.com", format!("{role:?}").to_lowercase());
        Self {
            claims: Claims {
                user_id: 1,
                name: format!("{role:?}"),
                email: email.clone(),
                phone_number: "+62811000000".to_string(),
                role_id: role,
                token_type: TokenType::Access,
                extended: false,
                iss: TEST_ACCESS_ISSUER.to_string(),
                sub: email,
                exp: Utc::now().timestamp() + 3600,
            },
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(user.role)
            .user_id(user.id)
            .email(&user.email)
            .phone_number(&user.phone_number)
            .name(&user.name)
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.claims.user_id = user_id;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.claims.name = name.to_string();
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.claims.email = email.to_string();
        self.claims.sub = email.to_string();
        self
    }

    pub fn phone_number(mut self, phone_number: &str) -> Self {
        self.claims.phone_number = phone_number.to_string();
        self
    }

    /// Refresh claims from the refresh issuer.
    pub fn refresh(mut self, extended: bool) -> Self {
        self.claims.token_type = TokenType::Refresh;
        self.claims.extended = extended;
        self.claims.iss = TEST_REFRESH_ISSUER.to_string();
        self
    }

    pub fn expired(mut self) -> Self {
        self.claims.exp = Utc::now().timestamp() - 3600;
        self
    }

    pub fn build(self) -> Claims {
        self.claims
    }
}
