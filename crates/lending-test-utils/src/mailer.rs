//! Mail sink that records instead of sending.

use async_trait::async_trait;
use lending_service::errors::LendingError;
use lending_service::mail::{Mail, MailSender};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message addressed to `recipient`.
    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    /// Poll until at least `count` mails were recorded or `timeout` passes.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Mail> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send_mail(&self, mail: &Mail) -> Result<(), LendingError> {
        if self.failing.lock().unwrap().contains(&mail.to) {
            return Err(LendingError::Internal(format!(
                "mailbox {} unavailable",
                mail.to
            )));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}
