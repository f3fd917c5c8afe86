use crate::services::description::{DescriptionRequest, Tone};
use crate::services::DispatchReport;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Product name cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 1, max = 120, message = "Product name must be 1-120 characters"),
        custom(function = "not_blank")
    )]
    pub product_name: String,

    #[validate(length(max = 2000, message = "Product details must be at most 2000 characters"))]
    pub product_details: Option<String>,

    #[validate(length(max = 200, message = "Target audience must be at most 200 characters"))]
    pub target_audience: Option<String>,

    #[serde(default)]
    pub tone: Tone,

    /// Opt-in for the follow-up emails. The welcome email is always sent.
    #[serde(default)]
    pub marketing_consent: bool,
}

impl GenerateRequest {
    pub fn description_request(&self) -> DescriptionRequest {
        DescriptionRequest {
            product_name: self.product_name.trim().to_string(),
            product_details: self.product_details.clone(),
            target_audience: self.target_audience.clone(),
            tone: self.tone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub request_id: String,
    pub product_name: String,
    pub description: String,
    pub cached: bool,
    pub emails: EmailSummary,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmailSummary {
    pub sent: u32,
    pub scheduled: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl From<DispatchReport> for EmailSummary {
    fn from(report: DispatchReport) -> Self {
        Self {
            sent: report.sent,
            scheduled: report.scheduled,
            skipped: report.skipped,
            failed: report.failed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
}
