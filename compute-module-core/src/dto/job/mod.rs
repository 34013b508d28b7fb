//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Body of a successful fetch-job response
///
/// ```json
/// { "type": "computeModuleJobV1", "computeModuleJobV1": { "jobId": "..", "queryType": "..", "query": {} } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEnvelope {
    ComputeModuleJobV1 {
        #[serde(rename = "computeModuleJobV1")]
        job: Job,
    },
}

impl JobEnvelope {
    /// Unwraps the job carried by the envelope
    pub fn into_job(self) -> Job {
        match self {
            JobEnvelope::ComputeModuleJobV1 { job } => job,
        }
    }
}

impl From<Job> for JobEnvelope {
    fn from(job: Job) -> Self {
        JobEnvelope::ComputeModuleJobV1 { job }
    }
}
