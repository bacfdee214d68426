//! JWT helpers shared by the token issuer, the verifier and the transport
//! layers.
//!
//! - Size limit applied before any parsing
//! - Unverified header inspection (`kid`, `alg`) for key lookup
//! - base64url (no padding) codecs for JWK `n`/`e` components
//! - `Authorization: Bearer <token>` parsing
//!
//! Nothing here verifies a signature. Callers must still verify the token
//! against the key selected with [`peek_header`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;

/// Maximum accepted JWT size in bytes (8KB).
///
/// Issued tokens are well under 1KB (RS256 signature plus a handful of user
/// claims). Anything larger is rejected before base64 decoding.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// The only signing algorithm accepted by the platform.
pub const RS256: &str = "RS256";

/// Authentication scheme expected in the `authorization` header/metadata.
pub const BEARER_SCHEME: &str = "Bearer";

/// Errors raised while inspecting a token before verification.
///
/// Every variant renders the same generic message; the detail is only
/// logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("Invalid/expired token")]
    TokenTooLarge,

    /// Not a three-part JWT, or the header is not base64url JSON.
    #[error("Invalid/expired token")]
    MalformedToken,

    /// Header has no usable `kid`.
    #[error("Invalid/expired token")]
    MissingKid,
}

/// Header fields read from an unverified token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnverifiedHeader {
    /// Key id used to select the verification key.
    pub kid: String,

    /// Declared algorithm. Checked against [`RS256`] by the verifier.
    #[serde(default)]
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: String,
}

/// Read the JOSE header of `token` without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` when the token exceeds the size limit
/// - `MalformedToken` when the token is not `header.payload.signature` or
///   the header cannot be decoded
/// - `MissingKid` when the header has no non-empty `kid`
pub fn peek_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: not a three-part JWT");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let kid = raw
        .kid
        .filter(|k| !k.is_empty())
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader { kid, alg: raw.alg })
}

/// Encode a big-endian integer (RSA modulus or exponent) for a JWK.
#[must_use]
pub fn encode_key_component(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a JWK `n`/`e` component back to big-endian bytes.
///
/// # Errors
///
/// Returns `base64::DecodeError` when the value is not unpadded base64url.
pub fn decode_key_component(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value)
}

/// Extract the token from an `authorization` value of the form
/// `Bearer <token>`.
///
/// The scheme is matched case-insensitively. Returns `None` for other
/// schemes or an empty token.
#[must_use]
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
