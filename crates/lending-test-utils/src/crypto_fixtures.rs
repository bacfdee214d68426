//! Committed RSA key fixtures.
//!
//! The keys under `fixtures/` exist only for tests. Key 1 and key 2 are
//! 2048-bit (PKCS#8 private, SPKI public); the weak key is a 1024-bit
//! public key only.

use common::secret::SecretString;
use lending_service::config::{JwtConfig, SigningKeyConfig};
use std::time::Duration;

pub const SIGNING_KEY_1_PEM: &str = include_str!("../fixtures/signing_key_1.pem");
pub const SIGNING_KEY_1_PUB_PEM: &str = include_str!("../fixtures/signing_key_1.pub.pem");
pub const SIGNING_KEY_2_PEM: &str = include_str!("../fixtures/signing_key_2.pem");
pub const SIGNING_KEY_2_PUB_PEM: &str = include_str!("../fixtures/signing_key_2.pub.pem");
pub const WEAK_KEY_PUB_PEM: &str = include_str!("../fixtures/weak_key.pub.pem");

/// base64url modulus of signing key 1, as published in the JWKS.
pub const SIGNING_KEY_1_MODULUS: &str = "v82licJH1P049CebYdgoCXzXseHA4zj0Gr6DurLvzRhk476p_SHfx3pW9CR4trw-_CXOwjYh8XfMRPDn0Br4OH1LYLQ_Gc66pcGzVC7qrfHOJF7SmnRQjDveHUa-d7wgoLuOK2wRYs_3bQE8FIABiZsNADJcEMLETzAhrj5EmMfIToI-hMIjooITWgduGkkiZTT-7WCZ7XkJHbuladO6CtR2gap4J63_IpfcTyGatuwcaGoE0HNWlaXiJ49H1-_0pBd9snEvAaM9De_6ibh8Knf-FLwEPDzw_z7s2c2XuGxrHACEnOtUZgUZGs3vrOPTuN1xYC7_tE8qqMx59Z_gKw";

pub const TEST_KEY_ID_1: &str = "test-key-01";
pub const TEST_KEY_ID_2: &str = "test-key-02";
pub const TEST_ACCESS_ISSUER: &str = "lending-access-test";
pub const TEST_REFRESH_ISSUER: &str = "lending-refresh-test";

/// Signing key config for fixture key 1 or 2.
pub fn test_signing_key(n: u8) -> SigningKeyConfig {
    let (kid, private, public) = match n {
        1 => (TEST_KEY_ID_1, SIGNING_KEY_1_PEM, SIGNING_KEY_1_PUB_PEM),
        2 => (TEST_KEY_ID_2, SIGNING_KEY_2_PEM, SIGNING_KEY_2_PUB_PEM),
        other => panic!("no signing key fixture {other}"),
    };
    SigningKeyConfig {
        kid: kid.to_string(),
        private_key_pem: SecretString::from(private),
        public_key_pem: public.to_string(),
    }
}

/// JWT config signing with key 1 and publishing keys 1 and 2.
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        keys: vec![test_signing_key(1), test_signing_key(2)],
        access_token_issuer: TEST_ACCESS_ISSUER.to_string(),
        access_token_ttl: Duration::from_secs(15 * 60),
        refresh_token_issuer: TEST_REFRESH_ISSUER.to_string(),
        refresh_token_ttl: Duration::from_secs(60 * 60),
        refresh_token_extended_ttl: Duration::from_secs(7 * 24 * 60 * 60),
    }
}
