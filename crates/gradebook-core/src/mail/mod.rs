//! Outbound reminder email.
//!
//! Every transport implements [`Mailer`]. Callers await `send` outside the
//! roster lock and log failures; a failed send is never retried.

mod log;
mod memory;
mod webhook;

pub use log::LogMailer;
pub use memory::{MemoryMailer, SentMail};
pub use webhook::WebhookMailer;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::MailError;
use crate::storage::{MailConfig, MailTransport};

/// Environment variable holding the relay bearer token.
pub const TOKEN_VAR: &str = "GRADEBOOK_MAIL_TOKEN";

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport identifier (e.g. "log", "webhook").
    fn name(&self) -> &str;

    /// Ask `student_name` at `to` to fill in their self-evaluation for `goal`.
    async fn send(&self, to: &str, student_name: &str, goal: &str) -> Result<(), MailError>;
}

/// Subject and plain-text body of a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

impl ReminderMessage {
    pub fn new(subject_prefix: &str, student_name: &str, goal: &str) -> Self {
        let subject = if subject_prefix.is_empty() {
            format!("Self-evaluation pending: {goal}")
        } else {
            format!("{subject_prefix} Self-evaluation pending: {goal}")
        };
        let body = format!(
            "Hello {student_name},\n\n\
             Your self-evaluation for the goal \"{goal}\" is still pending.\n\
             Please fill it in as soon as possible.\n"
        );
        Self { subject, body }
    }
}

/// Reject obviously unusable addresses before any transport work.
pub(crate) fn check_recipient(to: &str) -> Result<(), MailError> {
    let trimmed = to.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(MailError::InvalidRecipient(to.to_string())),
    }
}

/// Build the transport selected in `[mail]`.
///
/// # Errors
/// Returns [`MailError::NotConfigured`] for the webhook transport without a
/// usable `relay_url`.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer::new(&config.subject_prefix))),
        MailTransport::Webhook => {
            let relay_url = config
                .relay_url
                .as_deref()
                .ok_or_else(|| MailError::NotConfigured("mail.relay_url is not set".into()))?;
            let token = std::env::var(TOKEN_VAR).ok().filter(|t| !t.is_empty());
            Ok(Arc::new(WebhookMailer::new(
                relay_url,
                &config.from_address,
                &config.subject_prefix,
                token,
                Duration::from_secs(config.timeout_secs.max(1)),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_mentions_goal_and_name() {
        let msg = ReminderMessage::new("[Gradebook]", "Ana", "Tests");
        assert_eq!(msg.subject, "[Gradebook] Self-evaluation pending: Tests");
        assert!(msg.body.contains("Hello Ana"));
        assert!(msg.body.contains("\"Tests\""));
        assert_eq!(
            ReminderMessage::new("", "Ana", "Design").subject,
            "Self-evaluation pending: Design"
        );
    }

    #[test]
    fn recipient_needs_local_part_and_domain() {
        assert!(check_recipient("ana@example.com").is_ok());
        assert!(check_recipient("ana").is_err());
        assert!(check_recipient("@example.com").is_err());
        assert!(check_recipient("").is_err());
    }

    #[test]
    fn webhook_without_relay_is_not_configured() {
        let config = MailConfig {
            transport: MailTransport::Webhook,
            ..MailConfig::default()
        };
        assert!(matches!(
            mailer_from_config(&config),
            Err(MailError::NotConfigured(_))
        ));
        assert_eq!(
            mailer_from_config(&MailConfig::default()).unwrap().name(),
            "log"
        );
    }
}
