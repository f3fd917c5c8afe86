pub mod database;
pub mod description;
pub mod email;
pub mod llm;
pub mod metrics;
pub mod sequence;
pub mod unsubscribe;

pub use database::{InMemoryLeadStore, LeadStore, MongoLeadStore};
pub use description::{DescriptionRequest, DescriptionService, Generated, Tone};
pub use email::{
    EmailMessage, EmailProvider, MockEmailProvider, ProviderError, ProviderResponse,
    ResendProvider, SmtpProvider,
};
pub use llm::{GeminiTextProvider, LlmError, MockBehavior, MockTextProvider, TextProvider};
pub use metrics::{get_metrics, init_metrics};
pub use sequence::DispatchReport;
