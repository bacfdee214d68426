//! Common utilities shared across the lending platform crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, unverified header inspection,
/// JWK key component encoding, bearer scheme parsing)
pub mod jwt;
