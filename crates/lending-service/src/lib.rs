//! P2P lending backend.
//!
//! Users register and authenticate with RS256 tokens; borrowers propose
//! loans that field validators approve, investors fund and officers
//! disburse. Both a gRPC surface and a JSON gateway sit on top of the same
//! services.
//!
//! # Modules
//!
//! - `auth` - Token issuing, verification, JWKS and role checks
//! - `config` - Environment configuration
//! - `crypto` - Password hashing and RSA key handling
//! - `errors` - Error type and its gRPC/HTTP mappings
//! - `grpc` - tonic services and the bearer-token layer
//! - `handlers` / `routes` / `middleware` - HTTP surface
//! - `mail` - Outbound mail sinks
//! - `models` - Domain types
//! - `repositories` - Store traits and PostgreSQL implementations
//! - `services` - Business logic
//! - `validation` - Input checks shared by both transports

pub mod auth;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod grpc;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod validation;
