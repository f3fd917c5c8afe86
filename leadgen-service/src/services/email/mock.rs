use super::{EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Records messages instead of sending them.
pub struct MockEmailProvider {
    scheduling: bool,
    fail_sends: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MockEmailProvider {
    pub fn new(supports_scheduling: bool) -> Self {
        Self {
            scheduling: supports_scheduling,
            fail_sends: false,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new(true)
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        if self.fail_sends {
            return Err(ProviderError::SendFailed(
                "Mock email provider configured to fail".to_string(),
            ));
        }

        if !self.scheduling && email.send_at.is_some() {
            return Err(ProviderError::SchedulingUnsupported);
        }

        let n = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(
            tag = %email.tag,
            scheduled = email.send_at.is_some(),
            "[MOCK] Email would be sent"
        );

        Ok(ProviderResponse::new(Some(format!("mock-email-{}", n))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.fail_sends {
            return Err(ProviderError::Connection("Mock provider is down".to_string()));
        }
        Ok(())
    }

    fn supports_scheduling(&self) -> bool {
        self.scheduling
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
