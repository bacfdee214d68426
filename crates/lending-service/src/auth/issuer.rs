//! RS256 token issuance.

use crate::auth::claims::{Claims, TokenSubject, TokenType};
use crate::config::JwtConfig;
use crate::crypto::rsa_encoding_key;
use crate::errors::LendingError;
use crate::models::TokenPair;
use crate::observability::metrics::record_token_issuance;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Signs access and refresh tokens with the first configured key.
#[derive(Clone)]
pub struct TokenIssuer {
    kid: String,
    encoding_key: EncodingKey,
    access_issuer: String,
    access_ttl: Duration,
    refresh_issuer: String,
    refresh_ttl: Duration,
    refresh_extended_ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("kid", &self.kid)
            .field("access_issuer", &self.access_issuer)
            .field("refresh_issuer", &self.refresh_issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// # Errors
    ///
    /// `LendingError::Crypto` when there is no key or the first private key
    /// is not a valid RSA PEM.
    pub fn from_config(config: &JwtConfig) -> Result<Self, LendingError> {
        let signing = config
            .keys
            .first()
            .ok_or_else(|| LendingError::Crypto("no signing key configured".to_string()))?;

        Ok(Self {
            kid: signing.kid.clone(),
            encoding_key: rsa_encoding_key(&signing.private_key_pem)?,
            access_issuer: config.access_token_issuer.clone(),
            access_ttl: config.access_token_ttl,
            refresh_issuer: config.refresh_token_issuer.clone(),
            refresh_ttl: config.refresh_token_ttl,
            refresh_extended_ttl: config.refresh_token_extended_ttl,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Issuer string expected on tokens of this type.
    pub fn issuer_for(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_issuer,
            TokenType::Refresh => &self.refresh_issuer,
        }
    }

    fn ttl_for(&self, token_type: TokenType, extended: bool) -> Duration {
        match (token_type, extended) {
            (TokenType::Access, _) => self.access_ttl,
            (TokenType::Refresh, false) => self.refresh_ttl,
            (TokenType::Refresh, true) => self.refresh_extended_ttl,
        }
    }

    /// Build the claims for `subject` expiring `ttl` from now.
    pub fn build_claims(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        extended: bool,
    ) -> Claims {
        let ttl = chrono::Duration::from_std(self.ttl_for(token_type, extended))
            .unwrap_or_else(|_| chrono::Duration::zero());

        Claims {
            user_id: subject.user_id,
            name: subject.name.clone(),
            email: subject.email.clone(),
            phone_number: subject.phone_number.clone(),
            role_id: subject.role,
            token_type,
            extended,
            iss: self.issuer_for(token_type).to_string(),
            sub: subject.email.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        }
    }

    /// Sign `claims` with the active key.
    #[instrument(skip_all, fields(token_type = claims.token_type.as_str()))]
    pub fn sign(&self, claims: &Claims) -> Result<String, LendingError> {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        let token_type = claims.token_type.as_str();
        encode(&header, claims, &self.encoding_key)
            .map(|token| {
                record_token_issuance(token_type, "success");
                token
            })
            .map_err(|e| {
                record_token_issuance(token_type, "error");
                LendingError::Crypto(format!("JWT signing operation failed: {e}"))
            })
    }

    /// Issue a single token for `subject`.
    pub fn issue(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        extended: bool,
    ) -> Result<String, LendingError> {
        self.sign(&self.build_claims(subject, token_type, extended))
    }

    /// Issue an access token (never extended) and a refresh token
    /// (extended when `remember_me`).
    #[instrument(skip_all, fields(user_id = subject.user_id, remember_me = remember_me))]
    pub fn issue_pair(
        &self,
        subject: &TokenSubject,
        remember_me: bool,
    ) -> Result<TokenPair, LendingError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenType::Access, false)?,
            refresh_token: self.issue(subject, TokenType::Refresh, remember_me)?,
        })
    }
}
