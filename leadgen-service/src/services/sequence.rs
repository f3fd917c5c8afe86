//! The welcome/tips/offer email sequence sent after a description request.

use crate::config::SequenceConfig;
use crate::services::email::{EmailMessage, EmailProvider, ProviderError};
use crate::services::metrics;
use askama::Template;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use service_core::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    Welcome,
    Tips,
    Offer,
}

impl SequenceStep {
    pub fn tag(&self) -> &'static str {
        match self {
            SequenceStep::Welcome => "welcome",
            SequenceStep::Tips => "tips",
            SequenceStep::Offer => "offer",
        }
    }

    pub fn subject(&self, app_name: &str, product_name: &str) -> String {
        match self {
            SequenceStep::Welcome => format!("Your description for {} is ready", product_name),
            SequenceStep::Tips => format!("3 ways to get more from your {} copy", app_name),
            SequenceStep::Offer => format!("Unlock unlimited descriptions with {}", app_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedEmail {
    pub step: SequenceStep,
    /// `None` sends immediately.
    pub send_at: Option<DateTime<Utc>>,
}

/// Values shared by every email in the sequence.
#[derive(Debug, Clone)]
pub struct SequenceContext<'a> {
    pub to: &'a str,
    pub app_name: &'a str,
    pub company_name: &'a str,
    pub product_name: &'a str,
    pub description: &'a str,
    pub offer_url: &'a str,
    pub unsubscribe_url: &'a str,
    pub reply_to: Option<&'a str>,
}

/// The welcome email is always planned. Follow-ups need both the feature
/// switch and the lead's marketing consent.
pub fn plan(now: DateTime<Utc>, config: &SequenceConfig, marketing_consent: bool) -> Vec<PlannedEmail> {
    let mut planned = vec![PlannedEmail {
        step: SequenceStep::Welcome,
        send_at: None,
    }];

    if config.follow_ups_enabled && marketing_consent {
        for (step, hours) in [
            (SequenceStep::Tips, config.tips_delay_hours),
            (SequenceStep::Offer, config.offer_delay_hours),
        ] {
            match follow_up_at(now, hours) {
                Some(send_at) => planned.push(PlannedEmail {
                    step,
                    send_at: Some(send_at),
                }),
                None => {
                    tracing::warn!(step = step.tag(), hours, "Follow-up delay out of range, skipping");
                }
            }
        }
    }

    planned
}

fn follow_up_at(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    Duration::try_hours(hours.max(0)).and_then(|delay| now.checked_add_signed(delay))
}

#[derive(Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeHtml<'a> {
    ctx: &'a SequenceContext<'a>,
}

#[derive(Template)]
#[template(path = "emails/welcome.txt")]
struct WelcomeText<'a> {
    ctx: &'a SequenceContext<'a>,
}

#[derive(Template)]
#[template(path = "emails/tips.html")]
struct TipsHtml<'a> {
    ctx: &'a SequenceContext<'a>,
}

#[derive(Template)]
#[template(path = "emails/tips.txt")]
struct TipsText<'a> {
    ctx: &'a SequenceContext<'a>,
}

#[derive(Template)]
#[template(path = "emails/offer.html")]
struct OfferHtml<'a> {
    ctx: &'a SequenceContext<'a>,
}

#[derive(Template)]
#[template(path = "emails/offer.txt")]
struct OfferText<'a> {
    ctx: &'a SequenceContext<'a>,
}

pub fn render(
    step: SequenceStep,
    ctx: &SequenceContext<'_>,
    send_at: Option<DateTime<Utc>>,
) -> Result<EmailMessage, AppError> {
    let (body_html, body_text) = match step {
        SequenceStep::Welcome => (WelcomeHtml { ctx }.render()?, WelcomeText { ctx }.render()?),
        SequenceStep::Tips => (TipsHtml { ctx }.render()?, TipsText { ctx }.render()?),
        SequenceStep::Offer => (OfferHtml { ctx }.render()?, OfferText { ctx }.render()?),
    };

    Ok(EmailMessage {
        to: ctx.to.to_string(),
        subject: step.subject(ctx.app_name, ctx.product_name),
        body_text,
        body_html,
        reply_to: ctx.reply_to.map(str::to_string),
        send_at,
        unsubscribe_url: Some(ctx.unsubscribe_url.to_string()),
        tag: step.tag().to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: u32,
    pub scheduled: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Send each message in order. Failures are logged and counted; they never
/// stop the remaining messages.
pub async fn dispatch(provider: &dyn EmailProvider, messages: &[EmailMessage]) -> DispatchReport {
    let mut report = DispatchReport::default();
    let now = Utc::now();

    for message in messages {
        let scheduled = message.is_scheduled(now);

        if scheduled && !provider.supports_scheduling() {
            tracing::info!(
                tag = %message.tag,
                provider = provider.name(),
                "Provider cannot schedule, skipping follow-up email"
            );
            metrics::record_email(&message.tag, "skipped");
            report.skipped += 1;
            continue;
        }

        match provider.send(message).await {
            Ok(response) => {
                tracing::info!(
                    tag = %message.tag,
                    provider = provider.name(),
                    provider_id = ?response.provider_id,
                    scheduled,
                    "Sequence email accepted"
                );
                if scheduled {
                    metrics::record_email(&message.tag, "scheduled");
                    report.scheduled += 1;
                } else {
                    metrics::record_email(&message.tag, "sent");
                    report.sent += 1;
                }
            }
            Err(ProviderError::SchedulingUnsupported) => {
                tracing::info!(tag = %message.tag, "Provider rejected scheduled delivery, skipping");
                metrics::record_email(&message.tag, "skipped");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!(
                    tag = %message.tag,
                    provider = provider.name(),
                    error = %e,
                    "Failed to send sequence email"
                );
                metrics::record_email(&message.tag, "failed");
                report.failed += 1;
            }
        }
    }

    report
}
