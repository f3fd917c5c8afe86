use serde::Deserialize;
use service_core::config::{
    self as core_config, get_env, get_env_list, get_env_opt, get_env_parsed, is_production,
};
use service_core::error::AppError;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_RESEND_API_BASE: &str = "https://api.resend.com";

/// Upper bound for follow-up delays (30 days).
pub const MAX_FOLLOW_UP_DELAY_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone, Deserialize)]
pub struct LeadgenConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub sequence: SequenceConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub site: SiteConfig,
    pub unsubscribe: UnsubscribeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Gemini API key. Empty means the mock provider is used.
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: i32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    Mock,
    Resend,
    Smtp,
}

impl std::str::FromStr for EmailProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(EmailProviderKind::Mock),
            "resend" => Ok(EmailProviderKind::Resend),
            "smtp" => Ok(EmailProviderKind::Smtp),
            other => Err(format!("unknown email provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub provider: EmailProviderKind,
    pub api_key: String,
    pub api_base_url: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: Option<String>,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Master switch for the scheduled follow-up emails.
    pub follow_ups_enabled: bool,
    pub tips_delay_hours: i64,
    pub offer_delay_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub app_name: String,
    pub company_name: String,
    /// Public origin used to build links in emails, without trailing slash.
    pub public_base_url: String,
    pub contact_email: String,
    pub offer_url: String,
    pub privacy_last_updated: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeConfig {
    pub signing_secret: String,
}

impl LeadgenConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        Ok(LeadgenConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("leadgen_db"), is_prod)?,
            },
            llm: LlmConfig {
                api_key: get_env("GEMINI_API_KEY", Some(""), is_prod)?,
                model: get_env("GEMINI_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                api_base_url: get_env_opt("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
                timeout_secs: get_env_parsed("LLM_TIMEOUT_SECS", "30", false)?,
                temperature: get_env_parsed("LLM_TEMPERATURE", "0.7", false)?,
                max_output_tokens: get_env_parsed("LLM_MAX_OUTPUT_TOKENS", "512", false)?,
                max_retries: get_env_parsed("LLM_MAX_RETRIES", "2", false)?,
            },
            email: EmailConfig {
                provider: get_env_parsed("EMAIL_PROVIDER", "mock", is_prod)?,
                api_key: get_env("EMAIL_API_KEY", Some(""), is_prod)?,
                api_base_url: get_env_opt("EMAIL_API_BASE")
                    .unwrap_or_else(|| DEFAULT_RESEND_API_BASE.to_string()),
                from_email: get_env("EMAIL_FROM_ADDRESS", Some("hello@example.com"), is_prod)?,
                from_name: get_env("EMAIL_FROM_NAME", Some("Product Describer"), is_prod)?,
                reply_to: get_env_opt("EMAIL_REPLY_TO"),
                smtp: SmtpConfig {
                    host: get_env_opt("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                    port: get_env_parsed("SMTP_PORT", "587", false)?,
                    user: get_env_opt("SMTP_USER").unwrap_or_default(),
                    password: get_env_opt("SMTP_PASSWORD").unwrap_or_default(),
                },
            },
            sequence: SequenceConfig {
                follow_ups_enabled: get_env_parsed("EMAIL_FOLLOW_UPS_ENABLED", "true", false)?,
                tips_delay_hours: check_delay_hours(
                    "EMAIL_TIPS_DELAY_HOURS",
                    get_env_parsed("EMAIL_TIPS_DELAY_HOURS", "24", false)?,
                )?,
                offer_delay_hours: check_delay_hours(
                    "EMAIL_OFFER_DELAY_HOURS",
                    get_env_parsed("EMAIL_OFFER_DELAY_HOURS", "72", false)?,
                )?,
            },
            rate_limit: RateLimitConfig {
                max_requests: get_env_parsed("RATE_LIMIT_MAX_REQUESTS", "10", false)?,
                window_secs: get_env_parsed("RATE_LIMIT_WINDOW_SECS", "60", false)?,
            },
            cache: CacheConfig {
                ttl_secs: get_env_parsed("CACHE_TTL_SECS", "300", false)?,
                max_entries: get_env_parsed("CACHE_MAX_ENTRIES", "1000", false)?,
            },
            site: SiteConfig {
                app_name: get_env("SITE_APP_NAME", Some("Product Describer"), is_prod)?,
                company_name: get_env("SITE_COMPANY_NAME", Some("Example Labs"), is_prod)?,
                public_base_url: get_env(
                    "SITE_PUBLIC_BASE_URL",
                    Some("http://localhost:8080"),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
                contact_email: get_env("SITE_CONTACT_EMAIL", Some("privacy@example.com"), is_prod)?,
                offer_url: get_env("SITE_OFFER_URL", Some("https://example.com/pricing"), is_prod)?,
                privacy_last_updated: get_env(
                    "PRIVACY_LAST_UPDATED",
                    Some("January 1, 2025"),
                    is_prod,
                )?,
                allowed_origins: get_env_list("CORS_ALLOWED_ORIGINS", "*"),
            },
            unsubscribe: UnsubscribeConfig {
                signing_secret: get_env(
                    "UNSUBSCRIBE_SIGNING_SECRET",
                    Some("dev-unsubscribe-secret"),
                    is_prod,
                )?,
            },
        })
    }
}

fn check_delay_hours(key: &str, hours: i64) -> Result<i64, AppError> {
    if (0..=MAX_FOLLOW_UP_DELAY_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be between 0 and {}, got {}",
            key,
            MAX_FOLLOW_UP_DELAY_HOURS,
            hours
        )))
    }
}
