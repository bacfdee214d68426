//! Store interfaces consumed by the services, with PostgreSQL
//! implementations.
//!
//! The services depend on the traits only, so tests can run the full loan
//! lifecycle against in-memory stores.

pub mod loans;
pub mod users;

use crate::errors::LendingError;
use crate::models::{
    Loan, LoanApproval, LoanDisbursement, LoanId, LoanInvestment, NewLoan, NewLoanApproval,
    NewLoanDisbursement, NewLoanInvestment, NewUser, User, UserId, UserIdType,
};
use async_trait::async_trait;

pub use loans::PgLedgerStore;
pub use users::PgUserStore;

/// Loan persistence.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_loan(&self, loan: NewLoan) -> Result<Loan, LendingError>;

    /// Non-locking read; soft-deleted loans are invisible.
    async fn get_loan_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>, LendingError>;

    async fn list_investments_by_loan(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<LoanInvestment>, LendingError>;

    /// Open a serializable transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LendingError>;

    /// Connectivity check for readiness checks.
    async fn ping(&self) -> Result<(), LendingError>;
}

/// A serializable unit of work over one or more loans.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it
/// back.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read a loan and lock it until the transaction ends.
    async fn get_loan_by_id(&mut self, loan_id: LoanId) -> Result<Option<Loan>, LendingError>;

    /// Persist the mutable loan fields (rates, invested amount, state,
    /// agreement link, update audit).
    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LendingError>;

    async fn record_approval(
        &mut self,
        approval: NewLoanApproval,
    ) -> Result<LoanApproval, LendingError>;

    async fn record_investment(
        &mut self,
        investment: NewLoanInvestment,
    ) -> Result<LoanInvestment, LendingError>;

    async fn record_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement, LendingError>;

    async fn commit(self: Box<Self>) -> Result<(), LendingError>;

    async fn rollback(self: Box<Self>) -> Result<(), LendingError>;
}

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// # Errors
    ///
    /// `UserAlreadyExists` when an active user already holds the email or
    /// phone number.
    async fn create_user(&self, user: NewUser) -> Result<User, LendingError>;

    /// True when an ACTIVE, non-deleted user has this email or phone number.
    ///
    /// # Errors
    ///
    /// `InvalidUserIdType` for identifier types without a lookup column.
    async fn user_exists(&self, id_type: UserIdType, value: &str) -> Result<bool, LendingError>;

    /// Find a non-deleted user whose email or phone number equals
    /// `identifier`.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when nobody matches.
    async fn get_user_by_identifier(&self, identifier: &str) -> Result<User, LendingError>;

    /// Resolve users by id; unknown ids are skipped.
    async fn get_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, LendingError>;

    /// Mark the account CLOSED.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when the user does not exist.
    async fn close_account(&self, user_id: UserId, closed_by: UserId)
        -> Result<User, LendingError>;
}
