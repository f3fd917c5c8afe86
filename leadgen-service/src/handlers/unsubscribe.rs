use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;

use crate::dtos::UnsubscribeQuery;
use crate::models::normalize_email;
use crate::services::{metrics, unsubscribe::verify_unsubscribe_token};
use crate::AppState;

#[derive(Template)]
#[template(path = "unsubscribe.html")]
struct UnsubscribedPage<'a> {
    app_name: &'a str,
    company_name: &'a str,
    email: &'a str,
    already_unsubscribed: bool,
}

#[derive(Template)]
#[template(path = "unsubscribe_invalid.html")]
struct InvalidLinkPage<'a> {
    app_name: &'a str,
    company_name: &'a str,
    contact_email: &'a str,
}

/// Checks the signed link. Returns the normalized address when it is valid.
fn verified_email(state: &AppState, query: &UnsubscribeQuery) -> Result<Option<String>, AppError> {
    let email = normalize_email(&query.email);
    if email.is_empty() || query.token.trim().is_empty() {
        return Ok(None);
    }

    let valid = verify_unsubscribe_token(
        &state.config.unsubscribe.signing_secret,
        &email,
        &query.token,
    )?;

    Ok(valid.then_some(email))
}

async fn unsubscribe(state: &AppState, email: &str) -> Result<bool, AppError> {
    let changed = state.leads.mark_unsubscribed(email).await?;
    metrics::record_unsubscribe(if changed { "unsubscribed" } else { "repeat" });
    tracing::info!(changed, "Processed unsubscribe request");
    Ok(changed)
}

/// `GET /unsubscribe`: the link in every email footer.
#[tracing::instrument(skip_all)]
pub async fn unsubscribe_page(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Response, AppError> {
    let site = &state.config.site;

    let Some(email) = verified_email(&state, &query)? else {
        metrics::record_unsubscribe("invalid");
        tracing::warn!("Rejected unsubscribe link with invalid token");
        let page = InvalidLinkPage {
            app_name: &site.app_name,
            company_name: &site.company_name,
            contact_email: &site.contact_email,
        };
        return Ok((StatusCode::BAD_REQUEST, Html(page.render()?)).into_response());
    };

    let changed = unsubscribe(&state, &email).await?;

    let page = UnsubscribedPage {
        app_name: &site.app_name,
        company_name: &site.company_name,
        email: &email,
        already_unsubscribed: !changed,
    };
    Ok(Html(page.render()?).into_response())
}

/// `POST /unsubscribe`: RFC 8058 one-click unsubscribe from mail clients.
#[tracing::instrument(skip_all)]
pub async fn one_click_unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(email) = verified_email(&state, &query)? else {
        metrics::record_unsubscribe("invalid");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid or expired unsubscribe link"
        )));
    };

    unsubscribe(&state, &email).await?;
    Ok(Json(json!({ "status": "unsubscribed" })))
}
