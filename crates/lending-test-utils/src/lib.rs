//! # Lending Test Utilities
//!
//! Shared test utilities for the lending service.
//!
//! This crate provides:
//! - Committed RSA key fixtures (fixed keys for reproducible tests)
//! - In-memory ledger and user stores implementing the store traits
//! - A recording mail sink
//! - Claims builders and fixed test ids
//! - `TestLendingApp`, the full service graph over in-memory stores, and
//!   `TestLendingServer`, the same graph behind real gRPC/HTTP listeners
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lending_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let app = TestLendingApp::new();
//!     let borrower = app
//!         .user_store
//!         .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
//!         .await;
//!
//!     let request = CreateLoanRequest { principal_amount: "10000".to_string() };
//!     let loan = app
//!         .loans
//!         .create_loan(Some(&app.claims_for(&borrower)), request)
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod claims_builder;
pub mod crypto_fixtures;
pub mod mailer;
pub mod memory_stores;
pub mod server_harness;
pub mod test_ids;

// Re-export commonly used items
pub use claims_builder::*;
pub use crypto_fixtures::*;
pub use mailer::*;
pub use memory_stores::*;
pub use server_harness::*;
pub use test_ids::*;
