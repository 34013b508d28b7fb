//! Job domain types

use serde::{Deserialize, Serialize};

/// A single unit of work fetched from the job endpoint
///
/// Jobs are created server-side and never mutated by the runtime. The query
/// payload is opaque structured data handed to the matching handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub query_type: String,
    #[serde(default)]
    pub query: serde_json::Value,
}

impl Job {
    /// Creates a job, mostly useful for tests and local tooling
    pub fn new(
        job_id: impl Into<String>,
        query_type: impl Into<String>,
        query: serde_json::Value,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            query_type: query_type.into(),
            query,
        }
    }
}
