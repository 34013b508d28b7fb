//! Job-related API endpoints

use crate::error::{Result, TransportError};
use crate::ModuleClient;
use compute_module_core::domain::job::Job;
use compute_module_core::dto::job::JobEnvelope;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

impl ModuleClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Fetch the next job
    ///
    /// # Returns
    /// `Some(job)` on a 200 response, `None` for any other status, which the
    /// service uses to signal that nothing is available right now.
    pub async fn fetch_job(&self) -> Result<Option<Job>> {
        let response = self
            .request(Method::GET, &self.endpoints.get_job_url)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("No job available (status {})", status);
            return Ok(None);
        }

        let envelope: JobEnvelope = response
            .json()
            .await
            .map_err(|e| TransportError::ParseError(format!("Failed to parse job envelope: {}", e)))?;

        Ok(Some(envelope.into_job()))
    }

    /// Post the result of a job
    ///
    /// # Arguments
    /// * `job_id` - The job the result belongs to
    /// * `response` - The handler's response; strings are sent as raw UTF-8,
    ///   every other value as JSON
    pub async fn post_result(&self, job_id: &str, response: &Value) -> Result<()> {
        let url = self.endpoints.result_url(job_id);
        let body = encode_result(response)?;

        let response = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

fn encode_result(response: &Value) -> Result<Vec<u8>> {
    match response {
        Value::String(text) => Ok(text.clone().into_bytes()),
        other => serde_json::to_vec(other)
            .map_err(|e| TransportError::ParseError(format!("Failed to encode result: {}", e))),
    }
}
