//! JWKS derivation and public key lookup.
//!
//! The service publishes the public halves of its configured signing keys
//! as a JWKS document. Verification looks keys up by `kid` through a
//! [`KeySource`]: either the locally derived set, or a [`JwksClient`] that
//! fetches and caches a remote `/.well-known/jwks.json`.

use crate::config::SigningKeyConfig;
use crate::crypto::{rsa_public_components, MIN_RSA_MODULUS_BITS};
use crate::errors::LendingError;
use crate::models::{Jwk, Jwks};
use async_trait::async_trait;
use common::jwt::RS256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Build the JWKS for the configured key pairs, in configuration order.
///
/// A modulus shorter than 2048 bits is logged as a weak key; the key is
/// still published.
///
/// # Errors
///
/// Returns `LendingError::Crypto` if a public key PEM cannot be parsed.
pub fn derive_jwks(keys: &[SigningKeyConfig]) -> Result<Jwks, LendingError> {
    let mut jwks = Vec::with_capacity(keys.len());

    for key in keys {
        let components = rsa_public_components(&key.public_key_pem).map_err(|e| {
            tracing::error!(target: "lending.auth.jwks", kid = %key.kid, error = %e, "Failed to parse public key");
            e
        })?;

        if components.is_weak() {
            tracing::warn!(
                target: "lending.auth.jwks",
                kid = %key.kid,
                modulus_bits = components.modulus_bits,
                min_bits = MIN_RSA_MODULUS_BITS,
                "RSA signing key is weaker than recommended"
            );
        }

        jwks.push(Jwk {
            kty: "RSA".to_string(),
            kid: key.kid.clone(),
            use_: "sig".to_string(),
            alg: RS256.to_string(),
            n: components.n,
            e: components.e,
        });
    }

    Ok(Jwks { keys: jwks })
}

/// Lookup of verification keys by `kid`.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// # Errors
    ///
    /// `InvalidToken` when no key has this `kid`; `Internal` when the keys
    /// cannot be loaded at all.
    async fn find_key(&self, kid: &str) -> Result<Jwk, LendingError>;
}

/// Keys derived from this service's own configuration.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    keys: HashMap<String, Jwk>,
}

impl StaticKeySource {
    pub fn new(jwks: &Jwks) -> Self {
        Self {
            keys: jwks
                .keys
                .iter()
                .map(|key| (key.kid.clone(), key.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn find_key(&self, kid: &str) -> Result<Jwk, LendingError> {
        self.keys.get(kid).cloned().ok_or_else(|| {
            tracing::debug!(target: "lending.auth.jwks", kid = %kid, "Unknown kid");
            LendingError::InvalidToken("kid not found".to_string())
        })
    }
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    expires_at: Instant,
}

/// Fetches a remote JWKS and caches it for `cache_ttl`.
///
/// A `kid` missing from a fresh cache is rejected without refetching, so
/// tokens with random key ids cannot force a request per call.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
}

impl JwksClient {
    pub fn new(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "lending.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), LendingError> {
        tracing::debug!(target: "lending.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "lending.auth.jwks", error = %e, "Failed to fetch JWKS");
                LendingError::Internal(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "lending.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(LendingError::Internal(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwks: Jwks = response.json().await.map_err(|e| {
            tracing::error!(target: "lending.auth.jwks", error = %e, "Failed to parse JWKS response");
            LendingError::Internal(format!("JWKS parse failed: {e}"))
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(target: "lending.auth.jwks", key_count = keys.len(), "JWKS cache refreshed");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            expires_at: Instant::now() + self.cache_ttl,
        });

        Ok(())
    }
}

#[async_trait]
impl KeySource for JwksClient {
    #[instrument(skip(self), fields(kid = %kid))]
    async fn find_key(&self, kid: &str) -> Result<Jwk, LendingError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return cached.keys.get(kid).cloned().ok_or_else(|| {
                        tracing::debug!(target: "lending.auth.jwks", kid = %kid, "Key not found in JWKS cache");
                        LendingError::InvalidToken("kid not found".to_string())
                    });
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| {
                tracing::warn!(target: "lending.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                LendingError::InvalidToken("kid not found".to_string())
            })
    }
}
