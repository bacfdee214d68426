//! Loan lifecycle: propose, approve, invest, disburse.
//!
//! Every transition reads the loan with a row lock inside one transaction,
//! checks its guards against that locked copy, then writes the child record
//! and the updated loan before committing. Concurrent writers on the same
//! loan wait for the lock instead of failing. A guard failure
//! rolls the transaction back before anything is written.
//!
//! The pure `plan_*` functions hold the guards so the state machine can be
//! tested without a store.

use crate::auth::{authorize, Claims, Operation};
use crate::errors::LendingError;
use crate::models::{
    ApproveLoanRequest, ApproveLoanResponse, CreateLoanRequest, CreateLoanResponse,
    DisburseLoanRequest, DisburseLoanResponse, InvestInLoanRequest, InvestInLoanResponse, Loan,
    LoanId, LoanState, NewLoan, NewLoanApproval, NewLoanDisbursement, NewLoanInvestment, UserId,
};
use crate::observability::metrics::{record_investment_amount, record_loan_transition};
use crate::repositories::{LedgerStore, LedgerTransaction};
use crate::services::notification_service::{LoanFullyInvested, NotificationDispatcher};
use crate::validation::{
    amount_in_bounds, parse_decimal, parse_percentage, parse_principal, validate_loan_id,
    validate_url,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Attempts per transition when the store reports a serialization conflict
/// or a deadlock.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubled on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

// ============================================================================
// Guards
// ============================================================================

/// Guard for PROPOSED -> APPROVED.
pub fn plan_approval(loan: &Loan) -> Result<LoanState, LendingError> {
    if loan.state != LoanState::Proposed {
        return Err(LendingError::LoanNotProposed);
    }
    Ok(LoanState::Approved)
}

/// Guards for an investment, checked in order: state open for
/// investment, amount within platform bounds, no overfunding.
///
/// Returns INVESTED when the amount exactly fills the loan, FUNDING
/// otherwise.
pub fn plan_investment(loan: &Loan, amount: Decimal) -> Result<LoanState, LendingError> {
    if !loan.state.is_open_for_investment() {
        return Err(LendingError::LoanNotApproved);
    }

    if !amount_in_bounds(amount) {
        return Err(LendingError::InvestmentAmountOutOfRange);
    }

    let total = loan
        .invested_amount
        .checked_add(amount)
        .ok_or(LendingError::InvestmentAmountOutOfRange)?;

    if total > loan.principal_amount {
        return Err(LendingError::InvestmentAmountOutOfRange);
    }

    Ok(if total == loan.principal_amount {
        LoanState::Invested
    } else {
        LoanState::Funding
    })
}

/// Guard for INVESTED -> DISBURSED.
pub fn plan_disbursement(loan: &Loan) -> Result<LoanState, LendingError> {
    if loan.state != LoanState::Invested {
        return Err(LendingError::LoanNotFullyInvested);
    }
    Ok(LoanState::Disbursed)
}

/// Move `loan` to `next`, refusing to go backwards.
fn advance(loan: &mut Loan, next: LoanState, actor: UserId) -> Result<(), LendingError> {
    if next.rank() < loan.state.rank() {
        return Err(LendingError::Internal(format!(
            "refusing loan {} transition {} -> {}",
            loan.id, loan.state, next
        )));
    }
    loan.state = next;
    loan.updated_at = Some(Utc::now());
    loan.updated_by = Some(actor);
    Ok(())
}

/// Run `attempt` until it succeeds, fails with something other than a
/// conflict, or `MAX_TRANSACTION_ATTEMPTS` is reached. Retries back off
/// exponentially from `RETRY_BASE_DELAY`.
pub async fn retry_on_conflict<T, F, Fut>(
    transition: &'static str,
    mut attempt: F,
) -> Result<T, LendingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LendingError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(LendingError::TransactionConflict) if tries < MAX_TRANSACTION_ATTEMPTS => {
                let delay = RETRY_BASE_DELAY.saturating_mul(1 << (tries - 1));
                tracing::debug!(
                    target: "lending.loan",
                    transition,
                    attempt = tries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Transaction conflict, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

async fn rollback_with(tx: Box<dyn LedgerTransaction>, err: LendingError) -> LendingError {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(target: "lending.loan", error = %e, "Rollback failed");
    }
    err
}

fn record_outcome<T>(transition: &'static str, result: &Result<T, LendingError>) {
    record_loan_transition(transition, if result.is_ok() { "success" } else { "error" });
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct LoanService {
    ledger: Arc<dyn LedgerStore>,
    notifier: NotificationDispatcher,
}

impl LoanService {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: NotificationDispatcher) -> Self {
        Self { ledger, notifier }
    }

    /// Propose a loan on behalf of the caller.
    #[instrument(skip_all)]
    pub async fn create_loan(
        &self,
        claims: Option<&Claims>,
        request: CreateLoanRequest,
    ) -> Result<CreateLoanResponse, LendingError> {
        let claims = authorize(claims, Operation::ProposeLoan)?;
        let principal_amount = parse_principal(&request.principal_amount)?;

        let result = self
            .ledger
            .create_loan(NewLoan {
                borrower_id: claims.user_id,
                principal_amount,
            })
            .await;
        record_outcome("create", &result);
        let loan = result?;

        tracing::info!(
            target: "lending.loan",
            loan_id = loan.id,
            borrower_id = loan.borrower_id,
            "Loan proposed"
        );

        Ok(CreateLoanResponse {
            loan_id: loan.id,
            state: loan.state,
            created_at: loan.created_at,
        })
    }

    #[instrument(skip_all, fields(loan_id = request.loan_id))]
    pub async fn approve_loan(
        &self,
        claims: Option<&Claims>,
        request: ApproveLoanRequest,
    ) -> Result<ApproveLoanResponse, LendingError> {
        let claims = authorize(claims, Operation::ApproveLoan)?;
        validate_loan_id(request.loan_id)?;
        validate_url("photo_proof_link", &request.photo_proof_link)?;
        let interest_rate = parse_percentage("interest_rate", &request.interest_rate)?;
        let roi = parse_percentage("roi", &request.roi)?;

        let loan_id = request.loan_id;
        let validator_id = claims.user_id;
        let photo_proof_link = request.photo_proof_link.trim();
        let result = retry_on_conflict("approve", move || {
            self.try_approve(loan_id, validator_id, photo_proof_link, interest_rate, roi)
        })
        .await;
        record_outcome("approve", &result);
        result
    }

    async fn try_approve(
        &self,
        loan_id: LoanId,
        validator_id: UserId,
        photo_proof_link: &str,
        interest_rate: Decimal,
        roi: Decimal,
    ) -> Result<ApproveLoanResponse, LendingError> {
        let mut tx = self.ledger.begin().await?;

        let Some(mut loan) = tx.get_loan_by_id(loan_id).await? else {
            return Err(rollback_with(tx, LendingError::NotFound).await);
        };
        let next = match plan_approval(&loan) {
            Ok(next) => next,
            Err(e) => return Err(rollback_with(tx, e).await),
        };

        let approval = tx
            .record_approval(NewLoanApproval {
                loan_id,
                validator_id,
                photo_proof_link: photo_proof_link.to_string(),
                approval_date: Utc::now(),
            })
            .await?;

        loan.interest_rate = interest_rate;
        loan.roi = roi;
        advance(&mut loan, next, validator_id)?;
        tx.update_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(target: "lending.loan", loan_id, validator_id, "Loan approved");

        Ok(ApproveLoanResponse {
            loan_id,
            state: loan.state,
            approval_date: approval.approval_date,
        })
    }

    /// Invest in an APPROVED or FUNDING loan.
    ///
    /// Reaching INVESTED queues investor notifications after commit; the
    /// response does not wait for them.
    #[instrument(skip_all, fields(loan_id = request.loan_id))]
    pub async fn invest_in_loan(
        &self,
        claims: Option<&Claims>,
        request: InvestInLoanRequest,
    ) -> Result<InvestInLoanResponse, LendingError> {
        let claims = authorize(claims, Operation::InvestInLoan)?;
        validate_loan_id(request.loan_id)?;
        let amount = parse_decimal("amount", &request.amount)?;

        let loan_id = request.loan_id;
        let investor_id = claims.user_id;
        let result = retry_on_conflict("invest", move || {
            self.try_invest(loan_id, investor_id, amount)
        })
        .await;
        record_outcome("invest", &result);
        let response = result?;

        if let Some(value) = amount.to_f64() {
            record_investment_amount(value);
        }

        if response.state == LoanState::Invested {
            self.notifier.dispatch(LoanFullyInvested {
                loan_id: response.loan_id,
            });
        }

        Ok(response)
    }

    async fn try_invest(
        &self,
        loan_id: LoanId,
        investor_id: UserId,
        amount: Decimal,
    ) -> Result<InvestInLoanResponse, LendingError> {
        let mut tx = self.ledger.begin().await?;

        let Some(mut loan) = tx.get_loan_by_id(loan_id).await? else {
            return Err(rollback_with(tx, LendingError::NotFound).await);
        };
        let next = match plan_investment(&loan, amount) {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(
                    target: "lending.loan",
                    loan_id,
                    state = %loan.state,
                    error = %e,
                    "Investment rejected"
                );
                return Err(rollback_with(tx, e).await);
            }
        };

        tx.record_investment(NewLoanInvestment {
            loan_id,
            investor_id,
            amount,
            invested_at: Utc::now(),
        })
        .await?;

        loan.invested_amount += amount;
        advance(&mut loan, next, investor_id)?;
        tx.update_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(
            target: "lending.loan",
            loan_id,
            investor_id,
            state = %loan.state,
            "Investment recorded"
        );

        Ok(InvestInLoanResponse {
            loan_id,
            invested_amount: loan.invested_amount,
            state: loan.state,
        })
    }

    #[instrument(skip_all, fields(loan_id = request.loan_id))]
    pub async fn disburse_loan(
        &self,
        claims: Option<&Claims>,
        request: DisburseLoanRequest,
    ) -> Result<DisburseLoanResponse, LendingError> {
        let claims = authorize(claims, Operation::DisburseLoan)?;
        validate_loan_id(request.loan_id)?;
        validate_url("signed_agreement_link", &request.signed_agreement_link)?;

        let loan_id = request.loan_id;
        let officer_id = claims.user_id;
        let link = request.signed_agreement_link.trim();
        let result = retry_on_conflict("disburse", move || {
            self.try_disburse(loan_id, officer_id, link)
        })
        .await;
        record_outcome("disburse", &result);
        result
    }

    async fn try_disburse(
        &self,
        loan_id: LoanId,
        officer_id: UserId,
        signed_agreement_link: &str,
    ) -> Result<DisburseLoanResponse, LendingError> {
        let mut tx = self.ledger.begin().await?;

        let Some(mut loan) = tx.get_loan_by_id(loan_id).await? else {
            return Err(rollback_with(tx, LendingError::NotFound).await);
        };
        let next = match plan_disbursement(&loan) {
            Ok(next) => next,
            Err(e) => return Err(rollback_with(tx, e).await),
        };

        let disbursement = tx
            .record_disbursement(NewLoanDisbursement {
                loan_id,
                officer_id,
                signed_agreement_link: signed_agreement_link.to_string(),
                disbursement_date: Utc::now(),
            })
            .await?;

        loan.agreement_link = Some(signed_agreement_link.to_string());
        advance(&mut loan, next, officer_id)?;
        tx.update_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(target: "lending.loan", loan_id, officer_id, "Loan disbursed");

        Ok(DisburseLoanResponse {
            loan_id,
            state: loan.state,
            disbursement_date: disbursement.disbursement_date,
        })
    }
}
