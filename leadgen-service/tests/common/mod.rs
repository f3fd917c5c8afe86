//! Shared setup for leadgen-service integration tests.
//!
//! Everything runs in-process against `build_router` with an in-memory lead
//! store and mock providers, so no MongoDB or network access is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use leadgen_service::{
    build_router,
    config::{
        CacheConfig, EmailConfig, EmailProviderKind, LeadgenConfig, LlmConfig, MongoConfig,
        RateLimitConfig, SequenceConfig, SiteConfig, SmtpConfig, UnsubscribeConfig,
    },
    models::Lead,
    services::{
        DescriptionService, InMemoryLeadStore, LeadStore, MockEmailProvider, MockTextProvider,
    },
    AppState,
};
use service_core::{cache::TtlCache, error::AppError, retry::RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const SIGNING_SECRET: &str = "test-unsubscribe-secret";
pub const BASE_URL: &str = "https://leads.example.test";

pub fn test_config(max_requests: u32) -> LeadgenConfig {
    LeadgenConfig {
        common: service_core::config::Config { port: 0 },
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "leadgen_test".to_string(),
        },
        llm: LlmConfig {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            api_base_url: "https://llm.example.test".to_string(),
            timeout_secs: 5,
            temperature: 0.7,
            max_output_tokens: 512,
            max_retries: 0,
        },
        email: EmailConfig {
            provider: EmailProviderKind::Mock,
            api_key: String::new(),
            api_base_url: "https://email.example.test".to_string(),
            from_email: "hello@example.test".to_string(),
            from_name: "Product Describer".to_string(),
            reply_to: None,
            smtp: SmtpConfig {
                host: String::new(),
                port: 587,
                user: String::new(),
                password: String::new(),
            },
        },
        sequence: SequenceConfig {
            follow_ups_enabled: true,
            tips_delay_hours: 24,
            offer_delay_hours: 72,
        },
        rate_limit: RateLimitConfig {
            max_requests,
            window_secs: 60,
        },
        cache: CacheConfig {
            ttl_secs: 300,
            max_entries: 100,
        },
        site: SiteConfig {
            app_name: "Product Describer".to_string(),
            company_name: "Example Labs".to_string(),
            public_base_url: BASE_URL.to_string(),
            contact_email: "privacy@example.test".to_string(),
            offer_url: "https://example.test/pricing".to_string(),
            privacy_last_updated: "March 1, 2025".to_string(),
            allowed_origins: vec!["*".to_string()],
        },
        unsubscribe: UnsubscribeConfig {
            signing_secret: SIGNING_SECRET.to_string(),
        },
    }
}

/// Lead store that is always down.
pub struct FailingLeadStore;

#[async_trait]
impl LeadStore for FailingLeadStore {
    async fn upsert_lead(&self, _email: &str, _product_name: &str) -> Result<Lead, AppError> {
        Err(AppError::DatabaseError(anyhow::anyhow!("connection refused")))
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<Lead>, AppError> {
        Err(AppError::DatabaseError(anyhow::anyhow!("connection refused")))
    }

    async fn mark_unsubscribed(&self, _email: &str) -> Result<bool, AppError> {
        Err(AppError::DatabaseError(anyhow::anyhow!("connection refused")))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Err(AppError::DatabaseError(anyhow::anyhow!("connection refused")))
    }
}

pub struct TestApp {
    pub router: Router,
    pub leads: Arc<InMemoryLeadStore>,
    pub text: Arc<MockTextProvider>,
    pub email: Arc<MockEmailProvider>,
    pub config: LeadgenConfig,
}

pub struct TestAppBuilder {
    config: LeadgenConfig,
    text: MockTextProvider,
    email: MockEmailProvider,
    failing_store: bool,
}

impl TestAppBuilder {
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.rate_limit.max_requests = max_requests;
        self
    }

    pub fn follow_ups_enabled(mut self, enabled: bool) -> Self {
        self.config.sequence.follow_ups_enabled = enabled;
        self
    }

    pub fn text_provider(mut self, provider: MockTextProvider) -> Self {
        self.text = provider;
        self
    }

    pub fn email_provider(mut self, provider: MockEmailProvider) -> Self {
        self.email = provider;
        self
    }

    pub fn failing_store(mut self) -> Self {
        self.failing_store = true;
        self
    }

    pub fn build(self) -> TestApp {
        let leads = Arc::new(InMemoryLeadStore::new());
        let text = Arc::new(self.text);
        let email = Arc::new(self.email);

        let store: Arc<dyn LeadStore> = if self.failing_store {
            Arc::new(FailingLeadStore) as Arc<dyn LeadStore>
        } else {
            leads.clone() as Arc<dyn LeadStore>
        };

        let descriptions = DescriptionService::new(
            text.clone(),
            Arc::new(TtlCache::new(
                Duration::from_secs(self.config.cache.ttl_secs),
                self.config.cache.max_entries,
            )),
            RetryConfig {
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                add_jitter: false,
                ..RetryConfig::with_max_retries(self.config.llm.max_retries)
            },
            self.config.llm.temperature,
            self.config.llm.max_output_tokens,
        );

        let state = AppState {
            config: self.config.clone(),
            leads: store,
            descriptions,
            email_provider: email.clone(),
            rate_limiter: service_core::middleware::create_ip_rate_limiter(
                self.config.rate_limit.max_requests,
                self.config.rate_limit.window_secs,
            ),
        };

        TestApp {
            router: build_router(state),
            leads,
            text,
            email,
            config: self.config,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            config: test_config(100),
            text: MockTextProvider::new(),
            email: MockEmailProvider::new(true),
            failing_store: false,
        }
    }

    pub fn spawn() -> Self {
        Self::builder().build()
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn generate(&self, body: serde_json::Value, client_ip: &str) -> Response<Body> {
        self.generate_raw(body.to_string(), client_ip).await
    }

    pub async fn generate_raw(&self, body: String, client_ip: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/api/descriptions")
                .header("content-type", "application/json")
                .header("content-length", body.len())
                .header("x-forwarded-for", client_ip)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("List-Unsubscribe=One-Click"))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("Body is not JSON")
}

pub fn valid_request(email: &str, product: &str) -> serde_json::Value {
    serde_json::json!({
        "email": email,
        "product_name": product,
        "product_details": "Double-walled stainless steel, keeps drinks hot for 12 hours",
        "target_audience": "commuters",
        "tone": "friendly"
    })
}
