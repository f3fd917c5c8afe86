pub mod generate;
pub mod health;
pub mod metrics;
pub mod privacy;
pub mod unsubscribe;

pub use generate::generate_description;
pub use health::{health_check, readiness_check};
pub use privacy::privacy_policy;
pub use unsubscribe::{one_click_unsubscribe, unsubscribe_page};
