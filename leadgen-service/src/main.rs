use leadgen_service::config::LeadgenConfig;
use leadgen_service::services::init_metrics;
use leadgen_service::startup::Application;
use service_core::config::get_env_opt;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = get_env_opt("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let otlp_endpoint = get_env_opt("OTLP_ENDPOINT");
    init_tracing("leadgen-service", &log_level, otlp_endpoint.as_deref());

    init_metrics();

    let config = LeadgenConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        email_provider = ?config.email.provider,
        follow_ups_enabled = config.sequence.follow_ups_enabled,
        "Starting leadgen service"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
