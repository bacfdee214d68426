//! In-memory implementations of the store traits.
//!
//! `InMemoryLedgerStore` serializes transactions on a single owned mutex
//! guard: a transaction works on a private copy of the ledger and swaps it
//! in on commit, so a dropped or rolled-back transaction leaves no trace.
//! Tests can force serialization conflicts and readiness failures.

use async_trait::async_trait;
use chrono::Utc;
use lending_service::crypto::hash_password;
use lending_service::errors::LendingError;
use lending_service::models::{
    Loan, LoanApproval, LoanDisbursement, LoanId, LoanInvestment, LoanState, NewLoan,
    NewLoanApproval, NewLoanDisbursement, NewLoanInvestment, NewUser, Role, User, UserId,
    UserIdType, UserStatus,
};
use lending_service::repositories::{LedgerStore, LedgerTransaction, UserStore};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::test_ids::TEST_PASSWORD;

/// Lowest cost bcrypt accepts; keeps seeded logins fast.
pub const TEST_BCRYPT_COST: u32 = 4;

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Ledger {
    loans: BTreeMap<LoanId, Loan>,
    approvals: Vec<LoanApproval>,
    investments: Vec<LoanInvestment>,
    disbursements: Vec<LoanDisbursement>,
    last_loan_id: LoanId,
    last_record_id: i64,
}

impl Ledger {
    fn next_record_id(&mut self) -> i64 {
        self.last_record_id += 1;
        self.last_record_id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledger: Arc<Mutex<Ledger>>,
    conflicts_pending: Arc<AtomicU32>,
    unavailable: AtomicBool,
    commits: Arc<AtomicU64>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with `TransactionConflict`.
    pub fn fail_next_commits(&self, n: u32) {
        self.conflicts_pending.store(n, Ordering::SeqCst);
    }

    /// Make `ping` fail, as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Read a loan including soft-deleted ones.
    pub async fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.ledger.lock().await.loans.get(&loan_id).cloned()
    }

    pub async fn approvals(&self, loan_id: LoanId) -> Vec<LoanApproval> {
        let ledger = self.ledger.lock().await;
        ledger
            .approvals
            .iter()
            .filter(|a| a.loan_id == loan_id)
            .cloned()
            .collect()
    }

    pub async fn investments(&self, loan_id: LoanId) -> Vec<LoanInvestment> {
        let ledger = self.ledger.lock().await;
        ledger
            .investments
            .iter()
            .filter(|i| i.loan_id == loan_id)
            .cloned()
            .collect()
    }

    pub async fn disbursements(&self, loan_id: LoanId) -> Vec<LoanDisbursement> {
        let ledger = self.ledger.lock().await;
        ledger
            .disbursements
            .iter()
            .filter(|d| d.loan_id == loan_id)
            .cloned()
            .collect()
    }

    /// Soft-delete a loan so it disappears from every store read.
    pub async fn soft_delete_loan(&self, loan_id: LoanId, deleted_by: UserId) {
        let mut ledger = self.ledger.lock().await;
        if let Some(loan) = ledger.loans.get_mut(&loan_id) {
            loan.deleted_at = Some(Utc::now());
            loan.deleted_by = Some(deleted_by);
        }
    }
}

fn visible(loan: &Loan) -> bool {
    loan.deleted_at.is_none()
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_loan(&self, loan: NewLoan) -> Result<Loan, LendingError> {
        let mut ledger = self.ledger.lock().await;
        ledger.last_loan_id += 1;
        let created = Loan {
            id: ledger.last_loan_id,
            borrower_id: loan.borrower_id,
            principal_amount: loan.principal_amount,
            interest_rate: Decimal::ZERO,
            roi: Decimal::ZERO,
            invested_amount: Decimal::ZERO,
            state: LoanState::Proposed,
            agreement_link: None,
            created_at: Utc::now(),
            created_by: Some(loan.borrower_id),
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
        };
        ledger.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_loan_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>, LendingError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.loans.get(&loan_id).filter(|l| visible(l)).cloned())
    }

    async fn list_investments_by_loan(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<LoanInvestment>, LendingError> {
        Ok(self.investments(loan_id).await)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LendingError> {
        let guard = Arc::clone(&self.ledger).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            conflicts_pending: Arc::clone(&self.conflicts_pending),
            commits: Arc::clone(&self.commits),
        }))
    }

    async fn ping(&self) -> Result<(), LendingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LendingError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Holds the ledger lock for its whole lifetime.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<Ledger>,
    staged: Ledger,
    conflicts_pending: Arc<AtomicU32>,
    commits: Arc<AtomicU64>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn get_loan_by_id(&mut self, loan_id: LoanId) -> Result<Option<Loan>, LendingError> {
        Ok(self
            .staged
            .loans
            .get(&loan_id)
            .filter(|l| visible(l))
            .cloned())
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LendingError> {
        if loan.invested_amount > loan.principal_amount {
            return Err(LendingError::Database(
                "check constraint loans_invested_le_principal violated".to_string(),
            ));
        }
        match self.staged.loans.get_mut(&loan.id) {
            Some(stored) if visible(stored) => {
                stored.interest_rate = loan.interest_rate;
                stored.roi = loan.roi;
                stored.invested_amount = loan.invested_amount;
                stored.state = loan.state;
                stored.agreement_link = loan.agreement_link.clone();
                stored.updated_at = loan.updated_at;
                stored.updated_by = loan.updated_by;
                Ok(())
            }
            _ => Err(LendingError::NotFound),
        }
    }

    async fn record_approval(
        &mut self,
        approval: NewLoanApproval,
    ) -> Result<LoanApproval, LendingError> {
        if self
            .staged
            .approvals
            .iter()
            .any(|a| a.loan_id == approval.loan_id)
        {
            return Err(LendingError::Database(
                "duplicate key value violates unique constraint on loan_approvals".to_string(),
            ));
        }
        let record = LoanApproval {
            id: self.staged.next_record_id(),
            loan_id: approval.loan_id,
            validator_id: approval.validator_id,
            photo_proof_link: approval.photo_proof_link,
            approval_date: approval.approval_date,
        };
        self.staged.approvals.push(record.clone());
        Ok(record)
    }

    async fn record_investment(
        &mut self,
        investment: NewLoanInvestment,
    ) -> Result<LoanInvestment, LendingError> {
        let record = LoanInvestment {
            id: self.staged.next_record_id(),
            loan_id: investment.loan_id,
            investor_id: investment.investor_id,
            amount: investment.amount,
            invested_at: investment.invested_at,
        };
        self.staged.investments.push(record.clone());
        Ok(record)
    }

    async fn record_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement, LendingError> {
        if self
            .staged
            .disbursements
            .iter()
            .any(|d| d.loan_id == disbursement.loan_id)
        {
            return Err(LendingError::Database(
                "duplicate key value violates unique constraint on loan_disbursements"
                    .to_string(),
            ));
        }
        let record = LoanDisbursement {
            id: self.staged.next_record_id(),
            loan_id: disbursement.loan_id,
            officer_id: disbursement.officer_id,
            signed_agreement_link: disbursement.signed_agreement_link,
            disbursement_date: disbursement.disbursement_date,
        };
        self.staged.disbursements.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), LendingError> {
        let InMemoryTransaction {
            mut guard,
            staged,
            conflicts_pending,
            commits,
        } = *self;

        let injected = conflicts_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(LendingError::TransactionConflict);
        }

        *guard = staged;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LendingError> {
        Ok(())
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    created_by: Option<UserId>,
    updated_by: Option<UserId>,
}

impl StoredUser {
    fn is_active(&self) -> bool {
        self.user.status == UserStatus::Active
    }

    fn holds(&self, identifier: &str) -> bool {
        self.user.email == identifier || self.user.phone_number == identifier
    }
}

/// User store mirroring the partial unique indexes: only ACTIVE users
/// reserve an email or phone number.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<StoredUser>>,
    last_id: Mutex<UserId>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an ACTIVE user whose password is [`TEST_PASSWORD`].
    pub async fn seed_user(&self, role: Role, email: &str, phone_number: &str) -> User {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let password_hash =
            hash_password(TEST_PASSWORD, TEST_BCRYPT_COST).expect("bcrypt hash for test user");

        self.create_user(NewUser {
            name,
            email: email.to_string(),
            phone_number: phone_number.to_string(),
            password_hash,
            role,
            created_by: None,
        })
        .await
        .expect("seeded user must be unique")
    }

    /// Force a user's status, e.g. to exercise BLOCKED logins.
    pub async fn set_status(&self, user_id: UserId, status: UserStatus) {
        let mut users = self.users.lock().await;
        if let Some(stored) = users.iter_mut().find(|s| s.user.id == user_id) {
            stored.user.status = status;
        }
    }

    pub async fn user(&self, user_id: UserId) -> Option<User> {
        let users = self.users.lock().await;
        users
            .iter()
            .find(|s| s.user.id == user_id)
            .map(|s| s.user.clone())
    }

    /// `(created_by, updated_by)` audit columns of a user.
    pub async fn audit(&self, user_id: UserId) -> Option<(Option<UserId>, Option<UserId>)> {
        let users = self.users.lock().await;
        users
            .iter()
            .find(|s| s.user.id == user_id)
            .map(|s| (s.created_by, s.updated_by))
    }

    pub async fn count(&self) -> usize {
        self.users.lock().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, LendingError> {
        let mut users = self.users.lock().await;
        let taken = users.iter().any(|s| {
            s.is_active() && (s.user.email == user.email || s.user.phone_number == user.phone_number)
        });
        if taken {
            return Err(LendingError::UserAlreadyExists);
        }

        let mut last_id = self.last_id.lock().await;
        *last_id += 1;
        let created = User {
            id: *last_id,
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            status: UserStatus::Active,
            role: user.role,
            is_email_verified: false,
        };
        users.push(StoredUser {
            user: created.clone(),
            created_by: user.created_by,
            updated_by: None,
        });
        Ok(created)
    }

    async fn user_exists(&self, id_type: UserIdType, value: &str) -> Result<bool, LendingError> {
        let column: fn(&User) -> &str = match id_type {
            UserIdType::Email => |u| u.email.as_str(),
            UserIdType::PhoneNumber => |u| u.phone_number.as_str(),
            UserIdType::Username => return Err(LendingError::InvalidUserIdType),
        };

        let users = self.users.lock().await;
        Ok(users
            .iter()
            .any(|s| s.is_active() && column(&s.user) == value))
    }

    async fn get_user_by_identifier(&self, identifier: &str) -> Result<User, LendingError> {
        let users = self.users.lock().await;
        // Active account first, then the newest.
        users
            .iter()
            .filter(|s| s.holds(identifier))
            .max_by_key(|s| (s.is_active(), s.user.id))
            .map(|s| s.user.clone())
            .ok_or(LendingError::UserNotFound)
    }

    async fn get_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, LendingError> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .filter(|s| ids.contains(&s.user.id))
            .map(|s| s.user.clone())
            .collect())
    }

    async fn close_account(
        &self,
        user_id: UserId,
        closed_by: UserId,
    ) -> Result<User, LendingError> {
        let mut users = self.users.lock().await;
        let stored = users
            .iter_mut()
            .find(|s| s.user.id == user_id)
            .ok_or(LendingError::UserNotFound)?;
        stored.user.status = UserStatus::Closed;
        stored.updated_by = Some(closed_by);
        Ok(stored.user.clone())
    }
}
