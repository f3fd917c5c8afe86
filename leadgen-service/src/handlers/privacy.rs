use askama::Template;
use axum::{extract::State, response::Html};
use service_core::error::AppError;

use crate::AppState;

#[derive(Template)]
#[template(path = "privacy.html")]
struct PrivacyPage<'a> {
    app_name: &'a str,
    company_name: &'a str,
    contact_email: &'a str,
    last_updated: &'a str,
    follow_up_days: i64,
}

pub async fn privacy_policy(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let site = &state.config.site;
    let page = PrivacyPage {
        app_name: &site.app_name,
        company_name: &site.company_name,
        contact_email: &site.contact_email,
        last_updated: &site.privacy_last_updated,
        follow_up_days: (state.config.sequence.offer_delay_hours + 23) / 24,
    };
    Ok(Html(page.render()?))
}
