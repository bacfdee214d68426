//! Registration, login and token refresh.

use crate::auth::{registration_role, Claims, TokenIssuer, TokenSubject, TokenType, TokenVerifier};
use crate::crypto::{hash_password_blocking, verify_password_blocking};
use crate::errors::LendingError;
use crate::models::{
    LoginRequest, NewUser, RefreshTokenRequest, RegisterRequest, RegisterResponse,
    RegisterStatusCode, TokenPair, UserStatus,
};
use crate::repositories::UserStore;
use crate::services::user_service::existence_reasons;
use crate::validation::{is_valid_email, phone_with_country_code, require, validate_password};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

const MIN_LOGIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    issuer: Arc<TokenIssuer>,
    verifier: Arc<TokenVerifier>,
    bcrypt_cost: u32,
    default_country_code: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: Arc<TokenIssuer>,
        verifier: Arc<TokenVerifier>,
        bcrypt_cost: u32,
        default_country_code: String,
    ) -> Self {
        Self {
            users,
            issuer,
            verifier,
            bcrypt_cost,
            default_country_code,
        }
    }

    /// Register a user.
    ///
    /// Anonymous callers always get a BORROWER account. An existing active
    /// user with the same email or phone number is reported as a `FAILED`
    /// response with reasons rather than an error.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        caller: Option<&Claims>,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, LendingError> {
        let detail = request.user;

        require("name", &detail.name)?;
        let email = detail.email.trim();
        if !is_valid_email(email) {
            return Err(LendingError::MalformedEmail);
        }
        require("phone_number", &detail.phone_number)?;
        validate_password(detail.password.expose_secret())?;

        let role = registration_role(caller, detail.role_id)?;
        let phone_number =
            phone_with_country_code(detail.phone_number.trim(), &self.default_country_code);

        let reasons = existence_reasons(self.users.as_ref(), email, &phone_number).await?;
        if !reasons.is_empty() {
            tracing::debug!(target: "lending.auth", "Registration rejected, user exists");
            return Ok(RegisterResponse {
                code: RegisterStatusCode::Failed,
                reasons,
            });
        }

        let password_hash = hash_password_blocking(detail.password, self.bcrypt_cost).await?;

        let user = self
            .users
            .create_user(NewUser {
                name: detail.name.trim().to_string(),
                email: email.to_string(),
                phone_number,
                password_hash,
                role,
                created_by: caller.map(|c| c.user_id),
            })
            .await?;

        tracing::info!(
            target: "lending.auth",
            user_id = user.id,
            role = ?user.role,
            "User registered"
        );

        Ok(RegisterResponse {
            code: RegisterStatusCode::Succeed,
            reasons: Vec::new(),
        })
    }

    /// Authenticate by email or phone number and issue a token pair.
    #[instrument(skip_all, fields(remember_me = request.remember_me))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, LendingError> {
        let identifier = request.user_id.trim();
        require("user_id", identifier)?;
        if request.password.expose_secret().chars().count() < MIN_LOGIN_PASSWORD_LENGTH {
            return Err(LendingError::Validation(format!(
                "password must be at least {MIN_LOGIN_PASSWORD_LENGTH} characters."
            )));
        }

        let identifier = if identifier.contains('@') {
            identifier.to_string()
        } else {
            phone_with_country_code(identifier, &self.default_country_code)
        };

        let user = self.users.get_user_by_identifier(&identifier).await?;

        if user.status != UserStatus::Active {
            tracing::debug!(
                target: "lending.auth",
                user_id = user.id,
                status = %user.status,
                "Login refused for inactive user"
            );
            return Err(LendingError::UserIsNotActive);
        }

        let valid = verify_password_blocking(request.password, user.password_hash.clone()).await?;
        if !valid {
            tracing::debug!(target: "lending.auth", user_id = user.id, "Invalid password");
            return Err(LendingError::InvalidCredentials);
        }

        let tokens = self
            .issuer
            .issue_pair(&TokenSubject::from(&user), request.remember_me)?;

        tracing::info!(target: "lending.auth", user_id = user.id, "User logged in");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new pair. The new refresh token keeps
    /// the presented token's extended flag.
    #[instrument(skip_all)]
    pub async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<TokenPair, LendingError> {
        let token = request.refresh_token.expose_secret().trim();
        if token.is_empty() {
            return Err(LendingError::Validation(
                "refresh_token is required.".to_string(),
            ));
        }

        let claims = self.verifier.verify(token, TokenType::Refresh).await?;
        let tokens = self
            .issuer
            .issue_pair(&TokenSubject::from(&claims), claims.extended)?;

        tracing::debug!(target: "lending.auth", user_id = claims.user_id, "Tokens refreshed");
        Ok(tokens)
    }
}
