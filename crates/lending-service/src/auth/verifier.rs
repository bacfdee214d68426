//! RS256 token verification against a JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing
//! - Only RS256 is accepted, both in the token header and on the JWK
//! - Issuer must match the one configured for the expected token type
//! - Expired tokens are rejected
//! - Every failure surfaces as the same generic `InvalidToken` message

use crate::auth::claims::{Claims, TokenType};
use crate::auth::jwks::KeySource;
use crate::crypto::rsa_decoding_key;
use crate::errors::LendingError;
use crate::observability::metrics::record_token_validation;
use common::jwt::{peek_header, RS256};
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<dyn KeySource>,
    access_issuer: String,
    refresh_issuer: String,
}

impl TokenVerifier {
    pub fn new(keys: Arc<dyn KeySource>, access_issuer: String, refresh_issuer: String) -> Self {
        Self {
            keys,
            access_issuer,
            refresh_issuer,
        }
    }

    /// Verify `token` and require it to be of `expected` type.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for any malformed, unknown-key, wrong-algorithm,
    /// wrong-issuer, expired or wrong-type token. `Internal` only when the
    /// key source itself is unavailable.
    #[instrument(skip_all, fields(expected = expected.as_str()))]
    pub async fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, LendingError> {
        let result = self.verify_inner(token, expected).await;
        record_token_validation(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn verify_inner(&self, token: &str, expected: TokenType) -> Result<Claims, LendingError> {
        let header = peek_header(token).map_err(|e| {
            tracing::debug!(target: "lending.auth.jwt", error = ?e, "Token header rejected");
            LendingError::InvalidToken("malformed token".to_string())
        })?;

        if header.alg != RS256 {
            tracing::debug!(target: "lending.auth.jwt", alg = %header.alg, "Unexpected token algorithm");
            return Err(LendingError::InvalidToken("algorithm mismatch".to_string()));
        }

        let jwk = self.keys.find_key(&header.kid).await?;
        if jwk.kty != "RSA" || jwk.alg != RS256 {
            tracing::warn!(target: "lending.auth.jwt", kid = %jwk.kid, kty = %jwk.kty, alg = %jwk.alg, "JWK is not an RS256 key");
            return Err(LendingError::InvalidToken("unsupported key".to_string()));
        }

        let decoding_key = rsa_decoding_key(&jwk.n, &jwk.e).map_err(|e| {
            tracing::error!(target: "lending.auth.jwt", kid = %jwk.kid, error = %e, "Invalid JWK components");
            LendingError::InvalidToken("unsupported key".to_string())
        })?;

        let issuer = match expected {
            TokenType::Access => &self.access_issuer,
            TokenType::Refresh => &self.refresh_issuer,
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.set_issuer(&[issuer]);

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(target: "lending.auth.jwt", error = %e, "Token verification failed");
                LendingError::InvalidToken(e.to_string())
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(
                target: "lending.auth.jwt",
                token_type = claims.token_type.as_str(),
                "Token type mismatch"
            );
            return Err(LendingError::InvalidToken("token type mismatch".to_string()));
        }

        tracing::debug!(target: "lending.auth.jwt", user_id = claims.user_id, "Token validated successfully");
        Ok(claims)
    }
}
