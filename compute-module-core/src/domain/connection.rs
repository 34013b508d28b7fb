//! Connection domain types
//!
//! The runtime learns how to reach the job-issuing service from a descriptor
//! file written by an external process. The descriptor is resolved into a
//! set of fully-qualified [`Endpoints`] that the transport client consumes.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the connection descriptor file
///
/// Produced once during bootstrap and kept for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub get_job_path: String,
    pub post_result_path: String,
    /// PEM bundle used to verify the service certificate.
    /// Absent or empty means the system trust store is used.
    #[serde(default)]
    pub trust_store_path: Option<String>,
    pub module_auth_token: String,
    /// Prefix for the schema catalog endpoint (`{basePath}/schemas`)
    #[serde(default)]
    pub base_path: Option<String>,
}

impl ConnectionDescriptor {
    /// Origin of the service, e.g. `https://localhost:8443`
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }

    /// Returns the trust store path, ignoring empty values
    pub fn trust_store_path(&self) -> Option<&Path> {
        self.trust_store_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Path::new)
    }

    /// Path of the schema catalog endpoint
    pub fn schema_path(&self) -> String {
        let base = self.base_path.as_deref().unwrap_or_default();
        format!("{}/schemas", base.trim_end_matches('/'))
    }

    /// Resolves the descriptor into endpoints
    ///
    /// # Arguments
    /// * `trust_store` - PEM contents read from [`Self::trust_store_path`], if any
    pub fn into_endpoints(self, trust_store: Option<Vec<u8>>) -> Endpoints {
        let base_url = self.base_url();
        Endpoints {
            get_job_url: join_url(&base_url, &self.get_job_path),
            post_result_url: join_url(&base_url, &self.post_result_path),
            post_schema_url: Some(join_url(&base_url, &self.schema_path())),
            auth_token: self.module_auth_token,
            trust_store,
        }
    }
}

/// Fully resolved transport parameters
///
/// Both bootstrap modes (descriptor file and environment) end up here.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub get_job_url: String,
    pub post_result_url: String,
    /// `None` disables schema catalog publication
    pub post_schema_url: Option<String>,
    pub auth_token: String,
    /// PEM-encoded CA material added to the TLS verification chain
    pub trust_store: Option<Vec<u8>>,
}

impl Endpoints {
    /// URL the result of `job_id` is posted to
    pub fn result_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.post_result_url.trim_end_matches('/'), job_id)
    }
}

// The auth token must not end up in logs.
impl std::fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoints")
            .field("get_job_url", &self.get_job_url)
            .field("post_result_url", &self.post_result_url)
            .field("post_schema_url", &self.post_schema_url)
            .field("auth_token", &"<redacted>")
            .field("trust_store", &self.trust_store.as_ref().map(Vec::len))
            .finish()
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", base_url, path)
    } else {
        format!("{}/{}", base_url, path)
    }
}
