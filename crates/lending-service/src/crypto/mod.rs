//! Password hashing and RSA key handling.
//!
//! bcrypt is CPU bound, so the async wrappers move it onto the blocking
//! pool instead of stalling a runtime worker.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::LendingError;
use common::jwt::encode_key_component;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use tracing::instrument;

/// Minimum RSA modulus size considered strong.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `LendingError::Crypto` if the cost is outside 4..=31 or hashing
/// fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, LendingError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(LendingError::Crypto(format!(
            "Invalid bcrypt cost: {cost} (must be {MIN_BCRYPT_COST}-{MAX_BCRYPT_COST})"
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| LendingError::Crypto(format!("Password hashing failed: {e}")))
}

/// Check a password against a stored bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, LendingError> {
    bcrypt::verify(password, hash)
        .map_err(|e| LendingError::Crypto(format!("Password verification failed: {e}")))
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_blocking(
    password: SecretString,
    cost: u32,
) -> Result<String, LendingError> {
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret(), cost))
        .await
        .map_err(|e| LendingError::Internal(format!("bcrypt task failed: {e}")))?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(
    password: SecretString,
    hash: String,
) -> Result<bool, LendingError> {
    tokio::task::spawn_blocking(move || verify_password(password.expose_secret(), &hash))
        .await
        .map_err(|e| LendingError::Internal(format!("bcrypt task failed: {e}")))?
}

/// Public RSA key material in JWK form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaComponents {
    /// base64url (no padding) big-endian modulus
    pub n: String,
    /// base64url (no padding) big-endian public exponent
    pub e: String,
    pub modulus_bits: usize,
}

impl RsaComponents {
    pub fn is_weak(&self) -> bool {
        self.modulus_bits < MIN_RSA_MODULUS_BITS
    }
}

/// Parse an RSA public key PEM (SPKI or PKCS#1) into JWK components.
pub fn rsa_public_components(public_key_pem: &str) -> Result<RsaComponents, LendingError> {
    let key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
        .map_err(|e| LendingError::Crypto(format!("Invalid RSA public key: {e}")))?;

    Ok(RsaComponents {
        n: encode_key_component(&key.n().to_bytes_be()),
        e: encode_key_component(&key.e().to_bytes_be()),
        modulus_bits: key.n().bits(),
    })
}

/// Build the RS256 signing key from a private key PEM (PKCS#8 or PKCS#1).
pub fn rsa_encoding_key(private_key_pem: &SecretString) -> Result<EncodingKey, LendingError> {
    EncodingKey::from_rsa_pem(private_key_pem.expose_secret().as_bytes())
        .map_err(|e| LendingError::Crypto(format!("Invalid RSA private key: {e}")))
}

/// Rebuild an RS256 verification key from JWK `n`/`e`.
pub fn rsa_decoding_key(n: &str, e: &str) -> Result<DecodingKey, LendingError> {
    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| LendingError::Crypto(format!("Invalid RSA components: {err}")))
}
