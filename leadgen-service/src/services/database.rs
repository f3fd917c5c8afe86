use crate::models::{normalize_email, Lead};
use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

/// Persistence for captured leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Create the lead or refresh its product name. Never clears the
    /// unsubscribed flag.
    async fn upsert_lead(&self, email: &str, product_name: &str) -> Result<Lead, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, AppError>;

    /// Suppress an address, creating a record for it if needed. Returns true
    /// if the address was not already unsubscribed.
    async fn mark_unsubscribed(&self, email: &str) -> Result<bool, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct MongoLeadStore {
    client: MongoClient,
    db: Database,
}

impl MongoLeadStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for leadgen-service");

        let leads = self.leads();

        // One lead per address
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        leads.create_index(email_index, None).await.map_err(|e| {
            tracing::error!("Failed to create email index: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;

        // Index on created_utc for time-based exports (descending for recent first)
        let created_index = IndexModel::builder()
            .keys(doc! { "created_utc": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_utc_idx".to_string())
                    .build(),
            )
            .build();

        leads.create_index(created_index, None).await.map_err(|e| {
            tracing::error!("Failed to create created_utc index: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn leads(&self) -> Collection<Lead> {
        self.db.collection("leads")
    }
}

#[async_trait]
impl LeadStore for MongoLeadStore {
    async fn upsert_lead(&self, email: &str, product_name: &str) -> Result<Lead, AppError> {
        let email = normalize_email(email);
        let now = BsonDateTime::now();

        let update = doc! {
            "$set": {
                "product_name": product_name.trim(),
                "updated_utc": now,
            },
            "$inc": { "request_count": 1_i64 },
            "$setOnInsert": {
                "unsubscribed": false,
                "created_utc": now,
            },
        };

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.leads()
            .find_one_and_update(doc! { "email": email.as_str() }, update, options)
            .await
            .map_err(|e| {
                tracing::error!("Failed to upsert lead: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("Upsert returned no lead document"))
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, AppError> {
        self.leads()
            .find_one(doc! { "email": normalize_email(email) }, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find lead: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })
    }

    async fn mark_unsubscribed(&self, email: &str) -> Result<bool, AppError> {
        let email = normalize_email(email);
        let now = BsonDateTime::now();

        let update = doc! {
            "$set": {
                "unsubscribed": true,
                "updated_utc": now,
            },
            "$setOnInsert": {
                "product_name": "",
                "request_count": 0_i64,
                "created_utc": now,
            },
        };

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .build();

        let previous = self
            .leads()
            .find_one_and_update(doc! { "email": email.as_str() }, update, options)
            .await
            .map_err(|e| {
                tracing::error!("Failed to unsubscribe lead: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let changed = previous.as_ref().map_or(true, |lead| !lead.unsubscribed);

        if changed {
            // Only stamp the time of the first unsubscribe.
            self.leads()
                .update_one(
                    doc! {
                        "email": email.as_str(),
                        "unsubscribed_utc": { "$exists": false },
                    },
                    doc! { "$set": { "unsubscribed_utc": now } },
                    None,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to stamp unsubscribe time: {}", e);
                    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
                })?;
        }

        Ok(changed)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }
}

/// Process-local lead store for tests and local development.
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: DashMap<String, Lead>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn upsert_lead(&self, email: &str, product_name: &str) -> Result<Lead, AppError> {
        let email = normalize_email(email);
        let entry = self
            .leads
            .entry(email.clone())
            .and_modify(|lead| lead.record_request(product_name))
            .or_insert_with(|| Lead::new(&email, product_name));
        Ok(entry.value().clone())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Lead>, AppError> {
        Ok(self
            .leads
            .get(&normalize_email(email))
            .map(|lead| lead.value().clone()))
    }

    async fn mark_unsubscribed(&self, email: &str) -> Result<bool, AppError> {
        let email = normalize_email(email);
        let mut changed = true;
        self.leads
            .entry(email.clone())
            .and_modify(|lead| changed = lead.mark_unsubscribed())
            .or_insert_with(|| Lead::suppressed(&email));
        Ok(changed)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let store = InMemoryLeadStore::new();

        let first = store.upsert_lead("Jane@Example.com", "Widget").await.unwrap();
        assert_eq!(first.email, "jane@example.com");
        assert_eq!(first.request_count, 1);

        let second = store.upsert_lead("jane@example.com ", "Gadget").await.unwrap();
        assert_eq!(second.request_count, 2);
        assert_eq!(second.product_name, "Gadget");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_address_creates_suppression() {
        let store = InMemoryLeadStore::new();

        assert!(store.mark_unsubscribed("new@example.com").await.unwrap());
        assert!(!store.mark_unsubscribed("NEW@example.com").await.unwrap());

        let lead = store.find_by_email("new@example.com").await.unwrap().unwrap();
        assert!(lead.unsubscribed);
        assert_eq!(lead.request_count, 0);
    }

    #[tokio::test]
    async fn upsert_never_resubscribes() {
        let store = InMemoryLeadStore::new();
        store.upsert_lead("a@example.com", "Widget").await.unwrap();
        store.mark_unsubscribed("a@example.com").await.unwrap();

        let lead = store.upsert_lead("a@example.com", "Widget").await.unwrap();
        assert!(lead.unsubscribed);
    }
}
