use super::{format_sender, EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use crate::config::EmailConfig;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Transactional email over the Resend HTTP API. Supports scheduled delivery.
pub struct ResendProvider {
    api_key: String,
    api_base_url: String,
    from: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<ResendTag>,
}

#[derive(Debug, Serialize)]
struct ResendTag {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

impl ResendProvider {
    pub fn new(config: &EmailConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "EMAIL_API_KEY is required for the resend provider".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            from: format_sender(&config.from_name, &config.from_email),
            client,
        })
    }

    fn build_request(&self, email: &EmailMessage) -> ResendRequest {
        let mut headers = BTreeMap::new();
        if let Some(url) = &email.unsubscribe_url {
            headers.insert("List-Unsubscribe".to_string(), format!("<{}>", url));
            headers.insert(
                "List-Unsubscribe-Post".to_string(),
                "List-Unsubscribe=One-Click".to_string(),
            );
        }

        ResendRequest {
            from: self.from.clone(),
            to: vec![email.to.clone()],
            subject: email.subject.clone(),
            html: email.body_html.clone(),
            text: email.body_text.clone(),
            reply_to: email.reply_to.clone(),
            scheduled_at: email
                .send_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            headers,
            tags: vec![ResendTag {
                name: "category".to_string(),
                value: email.tag.clone(),
            }],
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(email);

        let response = self
            .client
            .post(format!("{}/emails", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to Resend: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => ProviderError::RateLimited(body),
                401 | 403 => ProviderError::Authentication(body),
                400 | 422 => ProviderError::InvalidRecipient(body),
                _ => ProviderError::SendFailed(format!(
                    "Resend API returned error status {}: {}",
                    status, body
                )),
            });
        }

        let resend_response: ResendResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse Resend response: {}", e))
        })?;

        tracing::info!(
            tag = %email.tag,
            scheduled = email.send_at.is_some(),
            provider_id = ?resend_response.id,
            "Email accepted by Resend"
        );

        Ok(ProviderResponse::new(resend_response.id))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // No dedicated health endpoint; a key must at least be present.
        if self.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "Resend API key is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn supports_scheduling(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
