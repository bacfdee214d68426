//! Domain models shared by the store, the services and both transports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type LoanId = i64;

// ============================================================================
// Loans
// ============================================================================

/// Loan lifecycle state.
///
/// Ordered PROPOSED < APPROVED < FUNDING/INVESTED < DISBURSED. FUNDING and
/// INVESTED share a rank boundary in the sense that investing can move
/// APPROVED straight to INVESTED, but a state never moves to a lower rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "loan_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanState {
    Proposed,
    Approved,
    Funding,
    Invested,
    Disbursed,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Proposed => "PROPOSED",
            LoanState::Approved => "APPROVED",
            LoanState::Funding => "FUNDING",
            LoanState::Invested => "INVESTED",
            LoanState::Disbursed => "DISBURSED",
        }
    }

    /// Position in the lifecycle, used to assert forward-only transitions.
    pub fn rank(&self) -> u8 {
        match self {
            LoanState::Proposed => 0,
            LoanState::Approved => 1,
            LoanState::Funding => 2,
            LoanState::Invested => 3,
            LoanState::Disbursed => 4,
        }
    }

    pub fn is_open_for_investment(&self) -> bool {
        matches!(self, LoanState::Approved | LoanState::Funding)
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSED" => Ok(LoanState::Proposed),
            "APPROVED" => Ok(LoanState::Approved),
            "FUNDING" => Ok(LoanState::Funding),
            "INVESTED" => Ok(LoanState::Invested),
            "DISBURSED" => Ok(LoanState::Disbursed),
            other => Err(format!("unknown loan state: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: UserId,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub roi: Decimal,
    pub invested_amount: Decimal,
    pub state: LoanState,
    pub agreement_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
}

impl Loan {
    /// Amount still open for investment.
    pub fn remaining_amount(&self) -> Decimal {
        self.principal_amount - self.invested_amount
    }
}

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub borrower_id: UserId,
    pub principal_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LoanApproval {
    pub id: i64,
    pub loan_id: LoanId,
    pub validator_id: UserId,
    pub photo_proof_link: String,
    pub approval_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLoanApproval {
    pub loan_id: LoanId,
    pub validator_id: UserId,
    pub photo_proof_link: String,
    pub approval_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LoanInvestment {
    pub id: i64,
    pub loan_id: LoanId,
    pub investor_id: UserId,
    pub amount: Decimal,
    pub invested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLoanInvestment {
    pub loan_id: LoanId,
    pub investor_id: UserId,
    pub amount: Decimal,
    pub invested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LoanDisbursement {
    pub id: i64,
    pub loan_id: LoanId,
    pub officer_id: UserId,
    pub signed_agreement_link: String,
    pub disbursement_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLoanDisbursement {
    pub loan_id: LoanId,
    pub officer_id: UserId,
    pub signed_agreement_link: String,
    pub disbursement_date: DateTime<Utc>,
}

// Loan operation inputs and results. The acting user always comes from the
// caller's claims, never from the request body.

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoanRequest {
    pub principal_amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLoanResponse {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveLoanRequest {
    #[serde(default)]
    pub loan_id: LoanId,
    pub photo_proof_link: String,
    pub interest_rate: String,
    pub roi: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApproveLoanResponse {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub approval_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestInLoanRequest {
    #[serde(default)]
    pub loan_id: LoanId,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestInLoanResponse {
    pub loan_id: LoanId,
    pub invested_amount: Decimal,
    pub state: LoanState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisburseLoanRequest {
    #[serde(default)]
    pub loan_id: LoanId,
    pub signed_agreement_link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisburseLoanResponse {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub disbursement_date: DateTime<Utc>,
}

// ============================================================================
// Users
// ============================================================================

/// Platform roles. The numeric ids are part of the token format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Role {
    Superadmin = 1,
    Admin = 2,
    FieldValidator = 3,
    Investor = 4,
    Borrower = 5,
}

impl Role {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Superadmin),
            2 => Ok(Role::Admin),
            3 => Ok(Role::FieldValidator),
            4 => Ok(Role::Investor),
            5 => Ok(Role::Borrower),
            other => Err(format!("unknown role id: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Blocked,
    Closed,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Blocked => "BLOCKED",
            UserStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column a user can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdType {
    Username,
    Email,
    PhoneNumber,
}

impl UserIdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIdType::Username => "username",
            UserIdType::Email => "email",
            UserIdType::PhoneNumber => "phone_number",
        }
    }

    /// Human-readable form used in existence reasons ("phone number").
    pub fn label(&self) -> String {
        self.as_str().replacen('_', " ", 1)
    }
}

impl FromStr for UserIdType {
    type Err = crate::errors::LendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "username" => Ok(UserIdType::Username),
            "email" => Ok(UserIdType::Email),
            "phone_number" => Ok(UserIdType::PhoneNumber),
            _ => Err(crate::errors::LendingError::InvalidUserIdType),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub role: Role,
    pub is_email_verified: bool,
}

// Password hash and contact details stay out of logs
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("role", &self.role)
            .field("is_email_verified", &self.is_email_verified)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub role: Role,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserDetail {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: secrecy::SecretString,
    #[serde(default)]
    pub role_id: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterUserDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisterStatusCode {
    Succeed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub code: RegisterStatusCode,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IsUserExistRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsUserExistResponse {
    pub is_exist: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseAccountResponse {
    pub user_id: UserId,
    pub status: UserStatus,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: secrecy::SecretString,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: secrecy::SecretString,
}

/// Access and refresh token pair returned by login and refresh.
#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// JSON Web Key Set served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// RSA public key descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}
