//! Application startup and lifecycle management.

use crate::config::{EmailProviderKind, LeadgenConfig};
use crate::services::{
    DescriptionService, EmailProvider, GeminiTextProvider, LeadStore, MockEmailProvider,
    MockTextProvider, MongoLeadStore, ResendProvider, SmtpProvider, TextProvider,
};
use crate::{build_router, AppState};
use service_core::cache::TtlCache;
use service_core::error::AppError;
use service_core::middleware::create_ip_rate_limiter;
use service_core::retry::RetryConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

/// How often idle rate-limit keys and expired cache entries are swept.
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

pub fn text_provider(config: &LeadgenConfig) -> Arc<dyn TextProvider> {
    if config.llm.api_key.trim().is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, using mock text provider");
        return Arc::new(MockTextProvider::new());
    }

    match GeminiTextProvider::new(&config.llm) {
        Ok(provider) => {
            tracing::info!(model = %config.llm.model, "Gemini text provider initialized");
            Arc::new(provider)
        }
        Err(e) => {
            tracing::warn!("Failed to initialize Gemini provider: {}. Using mock.", e);
            Arc::new(MockTextProvider::new())
        }
    }
}

pub fn email_provider(config: &LeadgenConfig) -> Arc<dyn EmailProvider> {
    let result = match config.email.provider {
        EmailProviderKind::Mock => {
            tracing::info!("Using mock email provider");
            return Arc::new(MockEmailProvider::new(true));
        }
        EmailProviderKind::Resend => {
            ResendProvider::new(&config.email).map(|p| Arc::new(p) as Arc<dyn EmailProvider>)
        }
        EmailProviderKind::Smtp => {
            SmtpProvider::new(&config.email).map(|p| Arc::new(p) as Arc<dyn EmailProvider>)
        }
    };

    match result {
        Ok(provider) => {
            tracing::info!(provider = provider.name(), "Email provider initialized");
            provider
        }
        Err(e) => {
            tracing::warn!("Failed to initialize email provider: {}. Using mock.", e);
            Arc::new(MockEmailProvider::new(true))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: LeadgenConfig) -> Result<Self, AppError> {
        let store = MongoLeadStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
        store.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;
        let leads: Arc<dyn LeadStore> = Arc::new(store);

        let cache = Arc::new(TtlCache::new(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_entries,
        ));
        let descriptions = DescriptionService::new(
            text_provider(&config),
            cache,
            RetryConfig::with_max_retries(config.llm.max_retries),
            config.llm.temperature,
            config.llm.max_output_tokens,
        );

        let rate_limiter =
            create_ip_rate_limiter(config.rate_limit.max_requests, config.rate_limit.window_secs);

        let state = AppState {
            email_provider: email_provider(&config),
            config: config.clone(),
            leads,
            descriptions,
            rate_limiter,
        };

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Leadgen service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let janitor = tokio::spawn(run_janitor(self.state.clone()));
        let router = build_router(self.state);

        let result = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        janitor.abort();
        tracing::info!("Service shutdown complete");
        result
    }
}

/// Periodically drop rate-limit windows and cache entries that have aged out.
async fn run_janitor(state: AppState) {
    let mut interval = tokio::time::interval(JANITOR_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let idle_keys = state.rate_limiter.purge_idle();
        let expired = state.descriptions.cache().purge_expired();
        tracing::debug!(idle_keys, expired, "Janitor sweep complete");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
