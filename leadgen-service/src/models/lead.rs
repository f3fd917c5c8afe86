use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A captured lead: who asked, and for which product.
///
/// One document per email address. Unsubscribing sets a flag instead of
/// deleting the record, so the address stays suppressed if it is submitted
/// again later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub request_count: i64,
    #[serde(default)]
    pub unsubscribed: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub unsubscribed_utc: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

// Helper module for optional DateTime<Utc> as BSON DateTime
mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => {
                let bson_dt = bson::DateTime::from_chrono(*dt);
                bson_dt.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}

impl Lead {
    pub fn new(email: &str, product_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            email: normalize_email(email),
            product_name: product_name.trim().to_string(),
            request_count: 1,
            unsubscribed: false,
            unsubscribed_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// A record that exists only to suppress an address that never submitted
    /// a request.
    pub fn suppressed(email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            email: normalize_email(email),
            product_name: String::new(),
            request_count: 0,
            unsubscribed: true,
            unsubscribed_utc: Some(now),
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn record_request(&mut self, product_name: &str) {
        self.product_name = product_name.trim().to_string();
        self.request_count += 1;
        self.updated_utc = Utc::now();
    }

    /// Returns true if the lead was subscribed before this call.
    pub fn mark_unsubscribed(&mut self) -> bool {
        if self.unsubscribed {
            return false;
        }
        let now = Utc::now();
        self.unsubscribed = true;
        self.unsubscribed_utc = Some(now);
        self.updated_utc = now;
        true
    }
}

/// Canonical form used as the lead key: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
