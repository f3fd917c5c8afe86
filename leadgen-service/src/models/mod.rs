pub mod lead;

pub use lead::{normalize_email, Lead};
