//! Token issuance, verification and role-based authorization.

pub mod claims;
pub mod guard;
pub mod issuer;
pub mod jwks;
pub mod verifier;

pub use claims::{Claims, TokenSubject, TokenType};
pub use guard::{authorize, registration_role, Operation};
pub use issuer::TokenIssuer;
pub use jwks::{derive_jwks, JwksClient, KeySource, StaticKeySource};
pub use verifier::TokenVerifier;
