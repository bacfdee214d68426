//! Concurrent investments into one loan.
//!
//! Each investment runs read-validate-write under the loan lock, so racing
//! investors can never push the loan past its principal.

use lending_service::errors::LendingError;
use lending_service::models::{
    ApproveLoanRequest, CreateLoanRequest, InvestInLoanRequest, LoanState, Role,
};
use lending_test_utils::*;
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_investors_never_overfund() {
    // Arrange
    let app = TestLendingApp::new();
    let borrower = app
        .user_store
        .seed_user(Role::Borrower, "bella@example.com", "+62811000001")
        .await;
    let validator = app
        .user_store
        .seed_user(Role::FieldValidator, "vic@example.com", "+62811000002")
        .await;

    let loan_id = app
        .loans
        .create_loan(
            Some(&app.claims_for(&borrower)),
            CreateLoanRequest {
                principal_amount: "5000".to_string(),
            },
        )
        .await
        .unwrap()
        .loan_id;
    app.loans
        .approve_loan(
            Some(&app.claims_for(&validator)),
            ApproveLoanRequest {
                loan_id,
                photo_proof_link: TEST_PHOTO_PROOF_LINK.to_string(),
                interest_rate: "8".to_string(),
                roi: "9".to_string(),
            },
        )
        .await
        .unwrap();

    let mut investors = Vec::new();
    for n in 0..10 {
        investors.push(
            app.user_store
                .seed_user(
                    Role::Investor,
                    &format!("investor{n}@example.com"),
                    &format!("+6282200000{n}"),
                )
                .await,
        );
    }

    // Act: ten investors race for five 1000 slots
    let mut handles = Vec::new();
    for investor in &investors {
        let loans = app.loans.clone();
        let claims = app.claims_for(investor);
        handles.push(tokio::spawn(async move {
            loans
                .invest_in_loan(
                    Some(&claims),
                    InvestInLoanRequest {
                        loan_id,
                        amount: "1000".to_string(),
                    },
                )
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LendingError::LoanNotApproved | LendingError::InvestmentAmountOutOfRange) => {}
            Err(other) => panic!("unexpected investment error: {other:?}"),
        }
    }

    // Assert
    assert_eq!(accepted, 5, "exactly the principal should be sold");
    let loan = app.ledger.loan(loan_id).await.unwrap();
    assert_eq!(loan.state, LoanState::Invested);
    assert_eq!(loan.invested_amount, dec!(5000));
    assert_eq!(app.ledger.investments(loan_id).await.len(), 5);

    let mails = app.mailer.wait_for(5, Duration::from_secs(5)).await;
    assert_eq!(mails.len(), 5, "each accepted investor is notified once");
}
