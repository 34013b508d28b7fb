//! Jobs repository
//!
//! Handles communication with the service for job-related operations:
//! - Fetching the next job
//! - Posting job results
//! - Publishing the schema catalog

use async_trait::async_trait;
use compute_module_client::{ModuleClient, TransportError};
use compute_module_core::domain::job::Job;
use compute_module_core::dto::schema::SchemaCatalogEntry;
use serde_json::Value;

/// Repository trait for job-related operations with the service
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fetches the next job, `None` when nothing is available right now
    async fn fetch_job(&self) -> Result<Option<Job>, TransportError>;

    /// Posts the result of a job
    ///
    /// # Arguments
    /// * `job_id` - The job the result belongs to
    /// * `response` - The handler's response
    async fn post_result(&self, job_id: &str, response: &Value) -> Result<(), TransportError>;

    /// Publishes the handler signatures
    async fn post_schema_catalog(&self, entries: &[SchemaCatalogEntry]) -> Result<(), TransportError>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: ModuleClient,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    pub fn new(client: ModuleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn fetch_job(&self) -> Result<Option<Job>, TransportError> {
        self.client.fetch_job().await
    }

    async fn post_result(&self, job_id: &str, response: &Value) -> Result<(), TransportError> {
        self.client.post_result(job_id, response).await
    }

    async fn post_schema_catalog(&self, entries: &[SchemaCatalogEntry]) -> Result<(), TransportError> {
        self.client.post_schema_catalog(entries).await
    }
}
