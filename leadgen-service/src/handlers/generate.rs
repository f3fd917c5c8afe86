use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;
use service_core::error::AppError;
use service_core::middleware::RequestId;
use validator::Validate;

use crate::dtos::{EmailSummary, GenerateRequest, GenerateResponse};
use crate::models::Lead;
use crate::services::sequence::{self, SequenceContext};
use crate::services::{metrics, unsubscribe, LlmError};
use crate::AppState;

/// Seconds a client should wait after the model provider throttled us.
const PROVIDER_RETRY_AFTER_SECS: u64 = 30;

fn map_llm_error(err: LlmError) -> AppError {
    match err {
        LlmError::RateLimited => {
            metrics::record_description_error("rate_limited");
            AppError::TooManyRequests(
                "The description service is busy, please try again shortly".to_string(),
                Some(PROVIDER_RETRY_AFTER_SECS),
            )
        }
        LlmError::ContentFiltered => {
            metrics::record_description_error("content_filtered");
            AppError::BadRequest(anyhow::anyhow!(
                "The request could not be processed because of content restrictions"
            ))
        }
        LlmError::InvalidRequest(msg) => {
            metrics::record_description_error("invalid_request");
            tracing::warn!(error = %msg, "Provider rejected the request");
            AppError::BadRequest(anyhow::anyhow!("The request could not be processed"))
        }
        LlmError::NotConfigured(msg) => {
            metrics::record_description_error("not_configured");
            tracing::error!(error = %msg, "Text provider is not configured");
            AppError::ServiceUnavailable
        }
        other => {
            metrics::record_description_error("upstream");
            tracing::error!(error = %other, "Description generation failed");
            AppError::BadGateway("Failed to generate a description".to_string())
        }
    }
}

/// Broken JSON is a 400. JSON that parses but does not fit the request
/// shape (missing field, wrong type, unknown tone) is a 422.
fn map_json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(e) => AppError::UnprocessableEntity(e.body_text()),
        other => AppError::BadRequest(anyhow::anyhow!(other.body_text())),
    }
}

/// Best effort: a store outage must not cost the caller their description.
async fn capture_lead(state: &AppState, email: &str, product_name: &str) -> Option<Lead> {
    match state.leads.upsert_lead(email, product_name).await {
        Ok(lead) => {
            metrics::record_lead_upsert("ok");
            Some(lead)
        }
        Err(e) => {
            metrics::record_lead_upsert("error");
            tracing::error!(error = %e, "Failed to store lead, skipping emails");
            None
        }
    }
}

async fn send_sequence(
    state: &AppState,
    lead: &Lead,
    product_name: &str,
    description: &str,
    marketing_consent: bool,
) -> EmailSummary {
    let site = &state.config.site;
    let unsubscribe_url = match unsubscribe::unsubscribe_url(
        &site.public_base_url,
        &state.config.unsubscribe.signing_secret,
        &lead.email,
    ) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build unsubscribe link, skipping emails");
            return EmailSummary::default();
        }
    };

    let ctx = SequenceContext {
        to: &lead.email,
        app_name: &site.app_name,
        company_name: &site.company_name,
        product_name,
        description,
        offer_url: &site.offer_url,
        unsubscribe_url: &unsubscribe_url,
        reply_to: state.config.email.reply_to.as_deref(),
    };

    let mut render_failures = 0;
    let messages: Vec<_> = sequence::plan(Utc::now(), &state.config.sequence, marketing_consent)
        .into_iter()
        .filter_map(|planned| match sequence::render(planned.step, &ctx, planned.send_at) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::error!(step = planned.step.tag(), error = %e, "Failed to render email");
                render_failures += 1;
                None
            }
        })
        .collect();

    let mut summary = EmailSummary::from(
        sequence::dispatch(state.email_provider.as_ref(), &messages).await,
    );
    summary.failed += render_failures;
    summary
}

#[tracing::instrument(skip_all, fields(tone = tracing::field::Empty, cached = tracing::field::Empty))]
pub async fn generate_description(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(request) = payload.map_err(map_json_rejection)?;
    request.validate()?;

    let span = tracing::Span::current();
    span.record("tone", request.tone.as_str());

    let description_request = request.description_request();
    let generated = state
        .descriptions
        .describe(&description_request)
        .await
        .map_err(map_llm_error)?;

    span.record("cached", generated.cached);
    metrics::record_description(if generated.cached {
        "cache"
    } else {
        state.descriptions.provider_name()
    });

    let emails = match capture_lead(&state, &request.email, &description_request.product_name).await {
        Some(lead) if lead.unsubscribed => {
            tracing::info!("Lead has unsubscribed, not sending emails");
            EmailSummary::default()
        }
        Some(lead) => {
            send_sequence(
                &state,
                &lead,
                &description_request.product_name,
                &generated.text,
                request.marketing_consent,
            )
            .await
        }
        None => EmailSummary::default(),
    };

    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(Json(GenerateResponse {
        request_id,
        product_name: description_request.product_name,
        description: generated.text,
        cached: generated.cached,
        emails,
    }))
}
