use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Liveness probe. Reports unhealthy when the lead store cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.leads.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Lead store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": SERVICE_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
    }
}

/// Readiness probe. Ready only when the lead store and both providers answer.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let (store, text, email) = tokio::join!(
        state.leads.health_check(),
        state.descriptions.provider_health(),
        state.email_provider.health_check(),
    );

    let mut ready = true;
    let mut check = |component: &str, result: Result<(), String>| match result {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(component, error = %e, "Readiness check failed");
            ready = false;
            "unavailable"
        }
    };

    let checks = json!({
        "lead_store": check("lead_store", store.map_err(|e| e.to_string())),
        "text_provider": check("text_provider", text.map_err(|e| e.to_string())),
        "email_provider": check("email_provider", email.map_err(|e| e.to_string())),
    });

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": checks,
        })),
    )
}
