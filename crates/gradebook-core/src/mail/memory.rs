//! In-memory transport that records what it was asked to send.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{check_recipient, Mailer};
use crate::error::MailError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub student_name: String,
    pub goal: String,
}

/// Records every successful send. Addresses registered with
/// [`fail_for`](Self::fail_for) are rejected instead.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
    call_count: AtomicU32,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(address.to_string());
        }
    }

    /// Successful sends, oldest first.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Attempts, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, to: &str, student_name: &str, goal: &str) -> Result<(), MailError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        check_recipient(to)?;
        let rejected = self
            .failing
            .lock()
            .map(|failing| failing.contains(to))
            .unwrap_or(false);
        if rejected {
            return Err(MailError::Rejected {
                status: 550,
                body: format!("mailbox unavailable: {to}"),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                to: to.to_string(),
                student_name: student_name.to_string(),
                goal: goal.to_string(),
            });
        }
        Ok(())
    }
}
