//! Investor notifications sent once a loan is fully invested.

use lending_service::models::{
    ApproveLoanRequest, CreateLoanRequest, InvestInLoanRequest, LoanId, Role, User,
};
use lending_service::services::notification_service::{
    LoanFullyInvested, INVESTMENT_CONFIRMATION_BODY, INVESTMENT_CONFIRMATION_SUBJECT,
};
use lending_service::services::{NotificationDispatcher, NotificationWorker};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use lending_test_utils::*;
use std::time::Duration;

const MAIL_WAIT: Duration = Duration::from_secs(5);

async fn approved_loan(app: &TestLendingApp, principal: &str) -> LoanId {
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
                principal_amount: principal.to_string(),
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
    loan_id
}

async fn invest(app: &TestLendingApp, investor: &User, loan_id: LoanId, amount: &str) {
    app.loans
        .invest_in_loan(
            Some(&app.claims_for(investor)),
            InvestInLoanRequest {
                loan_id,
                amount: amount.to_string(),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_each_investor_is_mailed_once_when_loan_fills() {
    let app = TestLendingApp::new();
    let loan_id = approved_loan(&app, "6000").await;
    let ina = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    let ivo = app
        .user_store
        .seed_user(Role::Investor, "ivo@example.com", "+62811000004")
        .await;

    invest(&app, &ina, loan_id, "2000").await;
    invest(&app, &ivo, loan_id, "2000").await;
    assert!(
        app.mailer.sent().is_empty(),
        "nobody is mailed while the loan is still funding"
    );
    invest(&app, &ina, loan_id, "2000").await;

    app.mailer.wait_for(2, MAIL_WAIT).await;
    // Give a duplicate a chance to show up before asserting there is none.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mails = app.mailer.sent();

    let mut recipients: Vec<_> = mails.iter().map(|m| m.to.clone()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["ina@example.com", "ivo@example.com"]);
    for mail in &mails {
        assert_eq!(mail.from, TEST_NOTIFICATION_FROM);
        assert_eq!(mail.subject, INVESTMENT_CONFIRMATION_SUBJECT);
        assert_eq!(mail.body, INVESTMENT_CONFIRMATION_BODY);
    }

    app.shutdown().await;
}

#[tokio::test]
async fn test_failed_delivery_does_not_block_other_investors() {
    let app = TestLendingApp::new();
    let loan_id = approved_loan(&app, "2000").await;
    let ina = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    let ivo = app
        .user_store
        .seed_user(Role::Investor, "ivo@example.com", "+62811000004")
        .await;
    app.mailer.fail_for("ina@example.com");

    invest(&app, &ina, loan_id, "1000").await;
    invest(&app, &ivo, loan_id, "1000").await;

    let mails = app.mailer.wait_for(1, MAIL_WAIT).await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "ivo@example.com");
}

#[tokio::test]
async fn test_cancelled_worker_still_delivers_queued_events() {
    let app = TestLendingApp::new();
    let loan_id = approved_loan(&app, "1000").await;
    let ina = app
        .user_store
        .seed_user(Role::Investor, "ina@example.com", "+62811000003")
        .await;
    invest(&app, &ina, loan_id, "1000").await;
    app.mailer.wait_for(1, MAIL_WAIT).await;

    // A second worker whose queue already holds events when it is cancelled.
    let mailer = Arc::new(RecordingMailer::new());
    let (dispatcher, rx) = NotificationDispatcher::channel(4);
    let worker = NotificationWorker::new(
        app.ledger.clone(),
        app.user_store.clone(),
        mailer.clone(),
        TEST_NOTIFICATION_FROM.to_string(),
        rx,
    );
    dispatcher.dispatch(LoanFullyInvested { loan_id });
    dispatcher.dispatch(LoanFullyInvested { loan_id });
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(MAIL_WAIT, worker.run(cancel))
        .await
        .expect("worker exits after draining");

    let mails = mailer.sent();
    assert_eq!(mails.len(), 2, "both queued events are delivered");
    assert!(mails.iter().all(|m| m.to == "ina@example.com"));
}
