//! PostgreSQL ledger store.
//!
//! Transactions run at READ COMMITTED and serialise on the loan row:
//! `get_loan_by_id` takes `SELECT ... FOR UPDATE`, so a second writer
//! blocks until the first commits and then reads the committed row. The
//! read-validate-write cycle of one investment never interleaves with
//! another on the same loan, and waiting writers are not aborted.

use crate::errors::LendingError;
use crate::models::{
    Loan, LoanApproval, LoanDisbursement, LoanId, LoanInvestment, NewLoan, NewLoanApproval,
    NewLoanDisbursement, NewLoanInvestment,
};
use crate::repositories::{LedgerStore, LedgerTransaction};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

const LOAN_COLUMNS: &str = r#"
    id, borrower_id, principal_amount, interest_rate, roi, invested_amount,
    state, agreement_link, created_at, created_by, updated_at, updated_by,
    deleted_at, deleted_by
"#;

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip_all, fields(borrower_id = loan.borrower_id))]
    async fn create_loan(&self, loan: NewLoan) -> Result<Loan, LendingError> {
        let query = format!(
            r#"
            INSERT INTO loans (borrower_id, principal_amount, created_by)
            VALUES ($1, $2, $1)
            RETURNING {LOAN_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Loan>(&query)
            .bind(loan.borrower_id)
            .bind(loan.principal_amount)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get_loan_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>, LendingError> {
        let query = format!(
            r#"
            SELECT {LOAN_COLUMNS}
            FROM loans
            WHERE id = $1 AND deleted_at IS NULL
            "#
        );

        let loan = sqlx::query_as::<_, Loan>(&query)
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(loan)
    }

    async fn list_investments_by_loan(
        &self,
        loan_id: LoanId,
    ) -> Result<Vec<LoanInvestment>, LendingError> {
        let investments = sqlx::query_as::<_, LoanInvestment>(
            r#"
            SELECT id, loan_id, investor_id, amount, invested_at
            FROM loan_investments
            WHERE loan_id = $1
            ORDER BY id
            "#,
        )
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(investments)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LendingError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), LendingError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn get_loan_by_id(&mut self, loan_id: LoanId) -> Result<Option<Loan>, LendingError> {
        let query = format!(
            r#"
            SELECT {LOAN_COLUMNS}
            FROM loans
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#
        );

        let loan = sqlx::query_as::<_, Loan>(&query)
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(loan)
    }

    #[instrument(skip_all, fields(loan_id = loan.id, state = %loan.state))]
    async fn update_loan(&mut self, loan: &Loan) -> Result<(), LendingError> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET interest_rate = $2,
                roi = $3,
                invested_amount = $4,
                state = $5,
                agreement_link = $6,
                updated_at = NOW(),
                updated_by = $7
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(loan.id)
        .bind(loan.interest_rate)
        .bind(loan.roi)
        .bind(loan.invested_amount)
        .bind(loan.state)
        .bind(&loan.agreement_link)
        .bind(loan.updated_by)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LendingError::NotFound);
        }

        Ok(())
    }

    async fn record_approval(
        &mut self,
        approval: NewLoanApproval,
    ) -> Result<LoanApproval, LendingError> {
        let row = sqlx::query_as::<_, LoanApproval>(
            r#"
            INSERT INTO loan_approvals (loan_id, validator_id, photo_proof_link, approval_date, created_by)
            VALUES ($1, $2, $3, $4, $2)
            RETURNING id, loan_id, validator_id, photo_proof_link, approval_date
            "#,
        )
        .bind(approval.loan_id)
        .bind(approval.validator_id)
        .bind(&approval.photo_proof_link)
        .bind(approval.approval_date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn record_investment(
        &mut self,
        investment: NewLoanInvestment,
    ) -> Result<LoanInvestment, LendingError> {
        let row = sqlx::query_as::<_, LoanInvestment>(
            r#"
            INSERT INTO loan_investments (loan_id, investor_id, amount, invested_at, created_by)
            VALUES ($1, $2, $3, $4, $2)
            RETURNING id, loan_id, investor_id, amount, invested_at
            "#,
        )
        .bind(investment.loan_id)
        .bind(investment.investor_id)
        .bind(investment.amount)
        .bind(investment.invested_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn record_disbursement(
        &mut self,
        disbursement: NewLoanDisbursement,
    ) -> Result<LoanDisbursement, LendingError> {
        let row = sqlx::query_as::<_, LoanDisbursement>(
            r#"
            INSERT INTO loan_disbursements (loan_id, officer_id, signed_agreement_link, disbursement_date, created_by)
            VALUES ($1, $2, $3, $4, $2)
            RETURNING id, loan_id, officer_id, signed_agreement_link, disbursement_date
            "#,
        )
        .bind(disbursement.loan_id)
        .bind(disbursement.officer_id)
        .bind(&disbursement.signed_agreement_link)
        .bind(disbursement.disbursement_date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), LendingError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LendingError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
