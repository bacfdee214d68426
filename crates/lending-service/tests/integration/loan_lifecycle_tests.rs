//! Loan lifecycle tests against the in-memory ledger.
//!
//! PROPOSED -> APPROVED -> FUNDING -> INVESTED -> DISBURSED, plus every
//! guard that refuses a transition out of order.

use lending_service::errors::LendingError;
use lending_service::models::{
    ApproveLoanRequest, CreateLoanRequest, DisburseLoanRequest, InvestInLoanRequest, LoanId,
    LoanState, Role, User,
};
use lending_service::services::loan_service::MAX_TRANSACTION_ATTEMPTS;
use lending_test_utils::*;
use rust_decimal_macros::dec;

struct Cast {
    borrower: User,
    validator: User,
    investor_a: User,
    investor_b: User,
    admin: User,
}

async fn seed_cast(app: &TestLendingApp) -> Cast {
    let store = &app.user_store;
    Cast {
        borrower: store
            .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
            .await,
        validator: store
            .seed_user(Role::FieldValidator, "vic@example.com", "+62811000002")
            .await,
        investor_a: store
            .seed_user(Role::Investor, "ina@example.com", "+62811000003")
            .await,
        investor_b: store
            .seed_user(Role::Investor, "ivo@example.com", "+62811000004")
            .await,
        admin: store
            .seed_user(Role::Admin, "ada@example.com", "+62811000005")
            .await,
    }
}

async fn propose(app: &TestLendingApp, borrower: &User, principal: &str) -> LoanId {
    app.loans
        .create_loan(
            Some(&app.claims_for(borrower)),
            CreateLoanRequest {
                principal_amount: principal.to_string(),
            },
        )
        .await
        .expect("loan proposal should succeed")
        .loan_id
}

async fn approve(app: &TestLendingApp, validator: &User, loan_id: LoanId) -> Result<LoanState, LendingError> {
    app.loans
        .approve_loan(
            Some(&app.claims_for(validator)),
            ApproveLoanRequest {
                loan_id,
                photo_proof_link: TEST_PHOTO_PROOF_LINK.to_string(),
                interest_rate: "10.5".to_string(),
                roi: "12".to_string(),
            },
        )
        .await
        .map(|r| r.state)
}

async fn invest(
    app: &TestLendingApp,
    investor: &User,
    loan_id: LoanId,
    amount: &str,
) -> Result<LoanState, LendingError> {
    app.loans
        .invest_in_loan(
            Some(&app.claims_for(investor)),
            InvestInLoanRequest {
                loan_id,
                amount: amount.to_string(),
            },
        )
        .await
        .map(|r| r.state)
}

async fn disburse(app: &TestLendingApp, officer: &User, loan_id: LoanId) -> Result<LoanState, LendingError> {
    app.loans
        .disburse_loan(
            Some(&app.claims_for(officer)),
            DisburseLoanRequest {
                loan_id,
                signed_agreement_link: TEST_AGREEMENT_LINK.to_string(),
            },
        )
        .await
        .map(|r| r.state)
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_full_loan_lifecycle() {
    // Arrange
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;

    // Act + Assert, one transition at a time
    let loan_id = propose(&app, &cast.borrower, "5000").await;
    let proposed = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(proposed.state, LoanState::Proposed);
    assert_eq!(proposed.borrower_id, cast.borrower.id);
    assert_eq!(proposed.created_by, Some(cast.borrower.id));

    assert_eq!(
        approve(&app, &cast.validator, loan_id).await.unwrap(),
        LoanState::Approved
    );
    assert_eq!(
        invest(&app, &cast.investor_a, loan_id, "2000").await.unwrap(),
        LoanState::Funding
    );
    assert_eq!(
        invest(&app, &cast.investor_b, loan_id, "3000").await.unwrap(),
        LoanState::Invested
    );
    assert_eq!(
        disburse(&app, &cast.admin, loan_id).await.unwrap(),
        LoanState::Disbursed
    );

    let loan = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Disbursed);
    assert_eq!(loan.invested_amount, dec!(5000));
    assert_eq!(loan.interest_rate, dec!(10.5));
    assert_eq!(loan.roi, dec!(12));
    assert_eq!(loan.agreement_link.as_deref(), Some(TEST_AGREEMENT_LINK));
    assert_eq!(loan.updated_by, Some(cast.admin.id));

    let approvals = app.ledger.approvals(loan_id).await;
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].validator_id, cast.validator.id);
    assert_eq!(approvals[0].photo_proof_link, TEST_PHOTO_PROOF_LINK);

    let investments = app.ledger.investments(loan_id).await;
    let investors: Vec<_> = investments.iter().map(|i| (i.investor_id, i.amount)).collect();
    assert_eq!(
        investors,
        vec![(cast.investor_a.id, dec!(2000)), (cast.investor_b.id, dec!(3000))]
    );

    let disbursements = app.ledger.disbursements(loan_id).await;
    assert_eq!(disbursements.len(), 1);
    assert_eq!(disbursements[0].officer_id, cast.admin.id);
}

#[tokio::test]
async fn test_single_investment_can_fill_loan() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "1000").await;
    approve(&app, &cast.validator, loan_id).await.unwrap();

    let state = invest(&app, &cast.investor_a, loan_id, "1000").await.unwrap();

    assert_eq!(state, LoanState::Invested);
}

// ============================================================================
// Investment bounds
// ============================================================================

#[tokio::test]
async fn test_investment_below_minimum_is_rejected() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "5000").await;
    approve(&app, &cast.validator, loan_id).await.unwrap();

    let result = invest(&app, &cast.investor_a, loan_id, "500").await;

    assert!(matches!(result, Err(LendingError::InvestmentAmountOutOfRange)));
    let loan = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Approved);
    assert_eq!(loan.invested_amount, dec!(0));
    assert!(app.ledger.investments(loan_id).await.is_empty());
}

#[tokio::test]
async fn test_overfunding_is_rejected_and_leaves_loan_untouched() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "5000").await;
    approve(&app, &cast.validator, loan_id).await.unwrap();
    invest(&app, &cast.investor_a, loan_id, "1000").await.unwrap();

    let result = invest(&app, &cast.investor_b, loan_id, "4000.01").await;

    assert!(matches!(result, Err(LendingError::InvestmentAmountOutOfRange)));
    let loan = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Funding);
    assert_eq!(loan.invested_amount, dec!(1000));
    assert_eq!(app.ledger.investments(loan_id).await.len(), 1);

    // The exact remainder still fits.
    let state = invest(&app, &cast.investor_b, loan_id, "4000").await.unwrap();
    assert_eq!(state, LoanState::Invested);
}

#[tokio::test]
async fn test_amount_with_three_decimals_is_a_validation_error() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "5000").await;
    approve(&app, &cast.validator, loan_id).await.unwrap();

    let result = invest(&app, &cast.investor_a, loan_id, "1000.005").await;

    assert!(matches!(result, Err(LendingError::Validation(_))));
}

#[tokio::test]
async fn test_principal_outside_bounds_is_rejected() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let claims = app.claims_for(&cast.borrower);

    for principal in ["999.99", "100000000.01", "abc", ""] {
        let result = app
            .loans
            .create_loan(
                Some(&claims),
                CreateLoanRequest {
                    principal_amount: principal.to_string(),
                },
            )
            .await;
        assert!(
            matches!(result, Err(LendingError::Validation(_))),
            "principal {principal:?} should be rejected, got {result:?}"
        );
    }
}

// ============================================================================
// Out-of-order transitions
// ============================================================================

#[tokio::test]
async fn test_transitions_out_of_order_are_refused() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "2000").await;

    // PROPOSED
    assert!(matches!(
        invest(&app, &cast.investor_a, loan_id, "1000").await,
        Err(LendingError::LoanNotApproved)
    ));
    assert!(matches!(
        disburse(&app, &cast.admin, loan_id).await,
        Err(LendingError::LoanNotFullyInvested)
    ));

    // APPROVED
    approve(&app, &cast.validator, loan_id).await.unwrap();
    assert!(matches!(
        approve(&app, &cast.validator, loan_id).await,
        Err(LendingError::LoanNotProposed)
    ));

    // FUNDING
    invest(&app, &cast.investor_a, loan_id, "1000").await.unwrap();
    assert!(matches!(
        disburse(&app, &cast.admin, loan_id).await,
        Err(LendingError::LoanNotFullyInvested)
    ));

    // INVESTED
    invest(&app, &cast.investor_b, loan_id, "1000").await.unwrap();
    assert!(matches!(
        invest(&app, &cast.investor_a, loan_id, "1000").await,
        Err(LendingError::LoanNotApproved)
    ));

    // DISBURSED
    disburse(&app, &cast.admin, loan_id).await.unwrap();
    assert!(matches!(
        disburse(&app, &cast.admin, loan_id).await,
        Err(LendingError::LoanNotFullyInvested)
    ));
    assert!(matches!(
        approve(&app, &cast.validator, loan_id).await,
        Err(LendingError::LoanNotProposed)
    ));

    assert_eq!(app.ledger.approvals(loan_id).await.len(), 1);
    assert_eq!(app.ledger.disbursements(loan_id).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_and_deleted_loans_are_not_found() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "2000").await;
    app.ledger.soft_delete_loan(loan_id, cast.admin.id).await;

    for id in [loan_id, UNKNOWN_LOAN_ID] {
        assert!(matches!(
            approve(&app, &cast.validator, id).await,
            Err(LendingError::NotFound)
        ));
    }
}

#[tokio::test]
async fn test_investment_guards_run_against_the_stored_loan() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let proposed = propose(&app, &cast.borrower, "2000").await;

    // The loan is looked up before the amount is judged.
    assert!(matches!(
        invest(&app, &cast.investor_a, UNKNOWN_LOAN_ID, "1").await,
        Err(LendingError::NotFound)
    ));
    // The state guard wins over the amount guard.
    assert!(matches!(
        invest(&app, &cast.investor_a, proposed, "1").await,
        Err(LendingError::LoanNotApproved)
    ));
    assert!(app.ledger.investments(proposed).await.is_empty());
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_roles_outside_the_operation_are_denied() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "2000").await;

    assert!(matches!(
        approve(&app, &cast.investor_a, loan_id).await,
        Err(LendingError::PermissionDenied)
    ));
    approve(&app, &cast.validator, loan_id).await.unwrap();
    assert!(matches!(
        invest(&app, &cast.borrower, loan_id, "1000").await,
        Err(LendingError::PermissionDenied)
    ));
    assert!(matches!(
        disburse(&app, &cast.validator, loan_id).await,
        Err(LendingError::PermissionDenied)
    ));
}

#[tokio::test]
async fn test_anonymous_caller_is_unauthenticated() {
    let app = TestLendingApp::new();

    let result = app
        .loans
        .create_loan(
            None,
            CreateLoanRequest {
                principal_amount: "5000".to_string(),
            },
        )
        .await;

    assert!(matches!(result, Err(LendingError::Unauthenticated)));
}

// ============================================================================
// Serialization conflicts
// ============================================================================

#[tokio::test]
async fn test_conflicting_commit_is_retried() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "5000").await;
    approve(&app, &cast.validator, loan_id).await.unwrap();
    let commits_before = app.ledger.commit_count();

    app.ledger.fail_next_commits(2);
    let state = invest(&app, &cast.investor_a, loan_id, "1000").await.unwrap();

    assert_eq!(state, LoanState::Funding);
    assert_eq!(app.ledger.commit_count(), commits_before + 1);
    assert_eq!(app.ledger.investments(loan_id).await.len(), 1);
}

#[tokio::test]
async fn test_conflict_surfaces_after_retries_are_exhausted() {
    let app = TestLendingApp::new();
    let cast = seed_cast(&app).await;
    let loan_id = propose(&app, &cast.borrower, "5000").await;

    app.ledger.fail_next_commits(MAX_TRANSACTION_ATTEMPTS);
    let result = approve(&app, &cast.validator, loan_id).await;

    assert!(matches!(result, Err(LendingError::TransactionConflict)));
    let loan = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Proposed);
    assert!(app.ledger.approvals(loan_id).await.is_empty());
}
