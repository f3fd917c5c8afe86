pub mod mock;
pub mod resend;
pub mod smtp;

pub use mock::MockEmailProvider;
pub use resend::ResendProvider;
pub use smtp::SmtpProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Provider cannot schedule delivery")]
    SchedulingUnsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
}

impl ProviderResponse {
    pub fn new(provider_id: Option<String>) -> Self {
        Self { provider_id }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub reply_to: Option<String>,
    /// Deliver at this time instead of immediately.
    pub send_at: Option<DateTime<Utc>>,
    /// Sent as `List-Unsubscribe` when present.
    pub unsubscribe_url: Option<String>,
    /// Short label such as `welcome`, used for provider tags and metrics.
    pub tag: String,
}

impl EmailMessage {
    /// True when delivery is requested for a time after `now`.
    pub fn is_scheduled(&self, now: DateTime<Utc>) -> bool {
        self.send_at.is_some_and(|at| at > now)
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError>;
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Whether `send` honours a future `send_at`.
    fn supports_scheduling(&self) -> bool;
    fn name(&self) -> &'static str;
}

/// `Name <address>` for the From header.
pub(crate) fn format_sender(name: &str, address: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        address.to_string()
    } else {
        format!("{} <{}>", name.replace(['<', '>', '"'], ""), address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn sender_strips_angle_brackets_from_name() {
        assert_eq!(
            format_sender("Acme <Team>", "hi@acme.test"),
            "Acme Team <hi@acme.test>"
        );
        assert_eq!(format_sender(" ", "hi@acme.test"), "hi@acme.test");
    }

    #[test]
    fn only_future_send_at_counts_as_scheduled() {
        let now = Utc::now();
        let mut msg = EmailMessage {
            to: "a@example.com".into(),
            subject: "s".into(),
            body_text: "t".into(),
            body_html: "<p>t</p>".into(),
            reply_to: None,
            send_at: None,
            unsubscribe_url: None,
            tag: "welcome".into(),
        };
        assert!(!msg.is_scheduled(now));

        msg.send_at = Some(now - Duration::minutes(1));
        assert!(!msg.is_scheduled(now));

        msg.send_at = Some(now + Duration::hours(24));
        assert!(msg.is_scheduled(now));
    }
}
