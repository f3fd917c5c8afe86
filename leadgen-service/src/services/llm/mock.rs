//! Mock text provider for tests and keyless local runs.

use super::{FinishReason, GenerationParams, LlmError, TextProvider, TextResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    /// Fail every call with a retryable error.
    RateLimited,
    /// Fail every call with a permanent error.
    ContentFiltered,
    /// Fail every call as if no key was configured.
    NotConfigured,
}

pub struct MockTextProvider {
    behavior: MockBehavior,
    calls: AtomicU64,
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Succeed)
    }

    pub fn failing(behavior: MockBehavior) -> Self {
        Self::with_behavior(behavior)
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Pull the product name back out of a prompt built by the description
/// service so the mock output reads naturally.
fn product_from_prompt(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Product name: "))
        .map(str::trim)
        .unwrap_or("this product")
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Succeed => {}
            MockBehavior::RateLimited => return Err(LlmError::RateLimited),
            MockBehavior::ContentFiltered => return Err(LlmError::ContentFiltered),
            MockBehavior::NotConfigured => {
                return Err(LlmError::NotConfigured(
                    "Mock text provider not enabled".to_string(),
                ))
            }
        }

        let product = product_from_prompt(prompt);
        let text = format!(
            "Meet {product}: thoughtfully made and ready for everyday use.\n\n\
             {product} pairs dependable quality with a design people enjoy reaching for."
        );

        Ok(TextResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        match self.behavior {
            MockBehavior::NotConfigured => Err(LlmError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_is_deterministic_and_counted() {
        let provider = MockTextProvider::new();
        let prompt = "Write copy.\nProduct name: Trail Mug\nTone: friendly";

        let a = provider.generate(prompt, &GenerationParams::default()).await.unwrap();
        let b = provider.generate(prompt, &GenerationParams::default()).await.unwrap();

        assert_eq!(a.text, b.text);
        assert!(a.text.contains("Trail Mug"));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn failing_mock_still_counts_calls() {
        let provider = MockTextProvider::failing(MockBehavior::RateLimited);
        let result = provider.generate("x", &GenerationParams::default()).await;

        assert!(matches!(result, Err(LlmError::RateLimited)));
        assert_eq!(provider.calls(), 1);
    }
}
