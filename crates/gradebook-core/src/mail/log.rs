//! Transport that writes reminders to the log. The default.

use async_trait::async_trait;
use tracing::info;

use super::{check_recipient, Mailer, ReminderMessage};
use crate::error::MailError;

pub struct LogMailer {
    subject_prefix: String,
}

impl LogMailer {
    pub fn new(subject_prefix: &str) -> Self {
        Self {
            subject_prefix: subject_prefix.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, to: &str, student_name: &str, goal: &str) -> Result<(), MailError> {
        check_recipient(to)?;
        let message = ReminderMessage::new(&self.subject_prefix, student_name, goal);
        info!(to, subject = %message.subject, "reminder email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_valid_and_rejects_invalid_recipients() {
        let mailer = LogMailer::new("[Gradebook]");
        assert!(mailer.send("ana@example.com", "Ana", "Tests").await.is_ok());
        assert!(matches!(
            mailer.send("not-an-address", "Ana", "Tests").await,
            Err(MailError::InvalidRecipient(_))
        ));
    }
}
