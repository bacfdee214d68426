//! Investor notifications.
//!
//! The loan service hands a [`LoanFullyInvested`] event to the dispatcher
//! after its transaction commits. A single background worker drains the
//! queue and mails every investor of the loan. Delivery failures are logged
//! and counted; they never affect the investment that triggered them.

use crate::errors::LendingError;
use crate::mail::{Mail, MailSender};
use crate::models::{LoanId, UserId};
use crate::observability::metrics::record_notification;
use crate::repositories::{LedgerStore, UserStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub const INVESTMENT_CONFIRMATION_SUBJECT: &str = "Investment Confirmation";
pub const INVESTMENT_CONFIRMATION_BODY: &str = "You have successfully invested";

/// A loan reached INVESTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanFullyInvested {
    pub loan_id: LoanId,
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<LoanFullyInvested>,
}

impl NotificationDispatcher {
    /// Create a bounded queue and return the dispatcher with its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LoanFullyInvested>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an event without waiting. A full or closed queue drops it.
    pub fn dispatch(&self, event: LoanFullyInvested) {
        match self.tx.try_send(event) {
            Ok(()) => {
                tracing::debug!(target: "lending.notify", loan_id = event.loan_id, "Notification queued");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    target: "lending.notify",
                    loan_id = event.loan_id,
                    "Notification queue full, dropping event"
                );
                record_notification("dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    target: "lending.notify",
                    loan_id = event.loan_id,
                    "Notification worker stopped, dropping event"
                );
                record_notification("dropped");
            }
        }
    }
}

pub struct NotificationWorker {
    ledger: Arc<dyn LedgerStore>,
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn MailSender>,
    from: String,
    rx: mpsc::Receiver<LoanFullyInvested>,
}

impl NotificationWorker {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn MailSender>,
        from: String,
        rx: mpsc::Receiver<LoanFullyInvested>,
    ) -> Self {
        Self {
            ledger,
            users,
            mailer,
            from,
            rx,
        }
    }

    /// Drain the queue until `cancel_token` fires or every dispatcher is
    /// dropped. Events already queued when cancellation arrives are still
    /// delivered.
    #[instrument(skip_all, name = "lending.task.notifications")]
    pub async fn run(mut self, cancel_token: CancellationToken) {
        tracing::info!(target: "lending.task.notifications", "Starting notification worker");

        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.handle(event).await;
                }
                () = cancel_token.cancelled() => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Ok(event) = self.rx.try_recv() {
                        self.handle(event).await;
                        drained += 1;
                    }
                    tracing::debug!(
                        target: "lending.task.notifications",
                        drained,
                        "Drained queued notifications"
                    );
                    break;
                }
            }
        }

        tracing::info!(target: "lending.task.notifications", "Notification worker stopped");
    }

    async fn handle(&self, event: LoanFullyInvested) {
        if let Err(e) = self.notify_investors(event.loan_id).await {
            tracing::error!(
                target: "lending.task.notifications",
                loan_id = event.loan_id,
                error = %e,
                "Failed to notify investors"
            );
            record_notification("error");
        }
    }

    /// Mail each distinct investor of `loan_id` once. Returns the number of
    /// messages delivered.
    #[instrument(skip_all, fields(loan_id = loan_id))]
    pub async fn notify_investors(&self, loan_id: LoanId) -> Result<usize, LendingError> {
        let investments = self.ledger.list_investments_by_loan(loan_id).await?;
        let investor_ids: Vec<UserId> = investments
            .iter()
            .map(|i| i.investor_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let investors = self.users.get_users_by_ids(&investor_ids).await?;

        let mut sent = 0;
        for investor in investors {
            let mail = Mail {
                from: self.from.clone(),
                to: investor.email.clone(),
                subject: INVESTMENT_CONFIRMATION_SUBJECT.to_string(),
                body: INVESTMENT_CONFIRMATION_BODY.to_string(),
            };

            match self.mailer.send_mail(&mail).await {
                Ok(()) => {
                    sent += 1;
                    record_notification("sent");
                }
                Err(e) => {
                    tracing::warn!(
                        target: "lending.notify",
                        loan_id,
                        investor_id = investor.id,
                        error = %e,
                        "Investment confirmation not delivered"
                    );
                    record_notification("error");
                }
            }
        }

        tracing::info!(
            target: "lending.notify",
            loan_id,
            investors = investor_ids.len(),
            sent,
            "Investment confirmations sent"
        );

        Ok(sent)
    }
}
