//! Secret types for values that must never reach a log line.
//!
//! Re-exports the [`secrecy`] wrappers used for plaintext passwords,
//! bearer tokens and RSA private key material. `SecretString` implements
//! `Debug` with redaction, so deriving `Debug` on a request type that holds
//! one stays safe to trace.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginForm {
//!     user_id: String,
//!     password: SecretString,
//! }
//!
//! let form = LoginForm {
//!     user_id: "borrower@example.com".to_string(),
//!     password: SecretString::from("Passw0rd!"),
//! };
//!
//! assert!(!format!("{form:?}").contains("Passw0rd!"));
//! assert_eq!(form.password.expose_secret(), "Passw0rd!");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
