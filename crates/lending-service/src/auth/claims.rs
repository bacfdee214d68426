//! JWT claims carried by access and refresh tokens.
//!
//! Name, email and phone number are redacted in Debug output.

use crate::models::{Role, User, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token kind, serialized as its numeric id (`0` access, `1` refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TokenType {
    Access = 0,
    Refresh = 1,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl From<TokenType> for u8 {
    fn from(token_type: TokenType) -> Self {
        token_type as u8
    }
}

impl TryFrom<u8> for TokenType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TokenType::Access),
            1 => Ok(TokenType::Refresh),
            other => Err(format!("unknown token type: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role_id: Role,
    pub token_type: TokenType,
    pub extended: bool,
    pub iss: String,
    /// Subject, always the user's email.
    pub sub: String,
    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("user_id", &self.user_id)
            .field("name", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("phone_number", &"[REDACTED]")
            .field("role_id", &self.role_id)
            .field("token_type", &self.token_type)
            .field("extended", &self.extended)
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .finish()
    }
}

impl Claims {
    pub fn role(&self) -> Role {
        self.role_id
    }
}

/// The user fields a token is minted from.
///
/// Login builds it from the stored user; refresh rebuilds it from the
/// presented refresh token without touching the store.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
}

impl fmt::Debug for TokenSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSubject")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role,
        }
    }
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            name: claims.name.clone(),
            email: claims.email.clone(),
            phone_number: claims.phone_number.clone(),
            role: claims.role_id,
        }
    }
}
