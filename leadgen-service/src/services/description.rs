//! Marketing description generation with a short-lived response cache.

use crate::services::llm::{GenerationParams, LlmError, TextProvider};
use serde::{Deserialize, Serialize};
use service_core::cache::TtlCache;
use service_core::retry::{retry_async, RetryConfig};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub const SYSTEM_INSTRUCTION: &str = "You are an experienced e-commerce copywriter. \
Write a persuasive, accurate product description in plain text. \
Use at most two short paragraphs and no more than 150 words. \
Do not use markdown, headings, bullet lists, emojis or surrounding quotes. \
Do not invent specifications, prices, certifications or claims that were not provided.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Playful,
    Luxury,
    Technical,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Playful => "playful",
            Tone::Luxury => "luxury",
            Tone::Technical => "technical",
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Tone::Professional => "clear, confident and polished",
            Tone::Friendly => "warm, approachable and conversational",
            Tone::Playful => "light-hearted and witty without being silly",
            Tone::Luxury => "refined, evocative and understated",
            Tone::Technical => "precise and specification-focused",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionRequest {
    pub product_name: String,
    pub product_details: Option<String>,
    pub target_audience: Option<String>,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub cached: bool,
}

fn normalize_field(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key for a request. Two requests that differ only in case or
/// whitespace share a key. The submitter's email is not part of the key.
pub fn cache_key(req: &DescriptionRequest) -> String {
    let fields = [
        normalize_field(&req.product_name),
        normalize_field(req.product_details.as_deref().unwrap_or("")),
        normalize_field(req.target_audience.as_deref().unwrap_or("")),
        req.tone.as_str().to_string(),
    ];

    // Length-prefix each field so no field boundary can be forged from input.
    let mut hasher = Sha256::new();
    for field in &fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn build_prompt(req: &DescriptionRequest) -> String {
    let mut prompt = String::from("Write a product description for the following product.\n\n");
    prompt.push_str(&format!("Product name: {}\n", req.product_name.trim()));

    if let Some(details) = req.product_details.as_deref().map(str::trim) {
        if !details.is_empty() {
            prompt.push_str(&format!("Product details: {}\n", details));
        }
    }
    if let Some(audience) = req.target_audience.as_deref().map(str::trim) {
        if !audience.is_empty() {
            prompt.push_str(&format!("Target audience: {}\n", audience));
        }
    }

    prompt.push_str(&format!(
        "Tone: {} ({})\n",
        req.tone.as_str(),
        req.tone.guidance()
    ));
    prompt
}

/// Strip wrapping code fences and quotes that models sometimes add, and
/// collapse runs of blank lines.
pub fn clean_description(text: &str) -> String {
    let mut s = text.trim();

    if let Some(inner) = s.strip_prefix("```") {
        // Drop an optional language tag on the opening fence.
        let inner = inner.split_once('\n').map_or(inner, |(_, rest)| rest);
        s = inner.trim_end().strip_suffix("```").unwrap_or(inner).trim();
    }

    for (open, close) in [("\"", "\""), ("\u{201c}", "\u{201d}")] {
        if s.len() > open.len() + close.len() && s.starts_with(open) && s.ends_with(close) {
            s = s[open.len()..s.len() - close.len()].trim();
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut newlines = 0;
    for ch in s.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else if ch == '\r' {
            continue;
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

#[derive(Clone)]
pub struct DescriptionService {
    provider: Arc<dyn TextProvider>,
    cache: Arc<TtlCache<String, String>>,
    retry: RetryConfig,
    params: GenerationParams,
}

impl DescriptionService {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        cache: Arc<TtlCache<String, String>>,
        retry: RetryConfig,
        temperature: f32,
        max_output_tokens: i32,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
            params: GenerationParams {
                system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
                temperature: Some(temperature),
                max_output_tokens: Some(max_output_tokens),
            },
        }
    }

    pub fn cache(&self) -> &Arc<TtlCache<String, String>> {
        &self.cache
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn provider_health(&self) -> Result<(), LlmError> {
        self.provider.health_check().await
    }

    pub async fn describe(&self, req: &DescriptionRequest) -> Result<Generated, LlmError> {
        let key = cache_key(req);

        if let Some(text) = self.cache.get(&key) {
            tracing::debug!(cache_key = %key, "Description served from cache");
            return Ok(Generated { text, cached: true });
        }

        let prompt = build_prompt(req);
        let provider = &self.provider;
        let params = &self.params;
        let prompt_ref = prompt.as_str();

        let response = retry_async(&self.retry, "generate_description", move || async move {
            provider.generate(prompt_ref, params).await
        })
        .await?;

        let text = clean_description(&response.text);
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        tracing::info!(
            provider = self.provider.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = response.finish_reason.as_str(),
            "Generated product description"
        );

        self.cache.insert(key, text.clone());
        Ok(Generated {
            text,
            cached: false,
        })
    }
}
