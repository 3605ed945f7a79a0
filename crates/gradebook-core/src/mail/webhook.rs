//! HTTP relay transport -- POST each reminder as JSON.
//!
//! The relay receives `{ from, to, subject, text }` and answers 2xx on
//! acceptance. A bearer token is sent when one is configured. Every request
//! is bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::{check_recipient, Mailer, ReminderMessage};
use crate::error::MailError;

pub struct WebhookMailer {
    client: Client,
    relay_url: Url,
    from_address: String,
    subject_prefix: String,
    token: Option<String>,
}

impl WebhookMailer {
    /// # Errors
    /// Returns [`MailError::NotConfigured`] if `relay_url` is not an absolute
    /// http(s) URL, or the HTTP client cannot be built.
    pub fn new(
        relay_url: &str,
        from_address: &str,
        subject_prefix: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let relay_url = Url::parse(relay_url)
            .map_err(|e| MailError::NotConfigured(format!("invalid relay_url '{relay_url}': {e}")))?;
        if !matches!(relay_url.scheme(), "http" | "https") {
            return Err(MailError::NotConfigured(format!(
                "relay_url must be http or https, got '{}'",
                relay_url.scheme()
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self {
            client,
            relay_url,
            from_address: from_address.to_string(),
            subject_prefix: subject_prefix.to_string(),
            token,
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, to: &str, student_name: &str, goal: &str) -> Result<(), MailError> {
        check_recipient(to)?;
        let message = ReminderMessage::new(&self.subject_prefix, student_name, goal);
        let body = json!({
            "from": self.from_address,
            "to": to,
            "subject": message.subject,
            "text": message.body,
        });

        let mut request = self.client.post(self.relay_url.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(MailError::Rejected {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}
