//! Fixed test ids and contact details.

use lending_service::models::{LoanId, UserId};

/// Never handed out by the in-memory user store.
pub const UNKNOWN_USER_ID: UserId = 9_999;

/// Never handed out by the in-memory ledger.
pub const UNKNOWN_LOAN_ID: LoanId = 9_999;

pub const TEST_PHOTO_PROOF_LINK: &str = "https://files.example.com/proof/field-visit.jpg";
pub const TEST_AGREEMENT_LINK: &str = "https://files.example.com/agreements/signed.pdf";

/// Satisfies the password policy.
pub const TEST_PASSWORD: &str = "Passw0rd!";
pub const TEST_COUNTRY_CODE: &str = "+62";
