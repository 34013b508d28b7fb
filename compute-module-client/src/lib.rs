//! Compute Module HTTP Client
//!
//! An authenticated HTTPS client for the job-issuing service.
//!
//! The client exposes the three calls the runtime needs: fetch the next job,
//! post a job result and post the schema catalog. Every request carries the
//! module auth token header, and the trust material from the connection
//! descriptor is added to the TLS verification chain.
//!
//! # Example
//!
//! ```no_run
//! use compute_module_client::ModuleClient;
//! use compute_module_core::domain::connection::Endpoints;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ModuleClient::new(Endpoints {
//!         get_job_url: "https://localhost:8443/job".to_string(),
//!         post_result_url: "https://localhost:8443/results".to_string(),
//!         post_schema_url: None,
//!         auth_token: "token".to_string(),
//!         trust_store: None,
//!     })?;
//!
//!     if let Some(job) = client.fetch_job().await? {
//!         client.post_result(&job.job_id, &job.query).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod schemas;

// Re-export commonly used types
pub use error::{Result, TransportError};

use compute_module_core::domain::connection::Endpoints;
use reqwest::{Certificate, Client, Method, RequestBuilder};

/// Header carrying the module auth token on every request
pub const AUTH_HEADER: &str = "Module-Auth-Token";

/// HTTP client for the job-issuing service
#[derive(Debug, Clone)]
pub struct ModuleClient {
    endpoints: Endpoints,
    /// HTTP client instance
    client: Client,
}

impl ModuleClient {
    /// Create a new client from resolved endpoints
    ///
    /// Certificates found in `endpoints.trust_store` are added as root
    /// certificates on top of the system trust store.
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(pem) = &endpoints.trust_store {
            let certificates = Certificate::from_pem_bundle(pem)
                .map_err(|e| TransportError::InvalidTrustStore(e.to_string()))?;
            if certificates.is_empty() {
                return Err(TransportError::InvalidTrustStore(
                    "no certificates found in PEM bundle".to_string(),
                ));
            }
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build()?;
        Ok(Self { endpoints, client })
    }

    /// Create a new client with a custom HTTP client
    ///
    /// The trust store in `endpoints` is ignored; configure TLS on `client`
    /// instead.
    pub fn with_client(endpoints: Endpoints, client: Client) -> Self {
        Self { endpoints, client }
    }

    /// Endpoints this client talks to
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Starts a request with the auth header attached
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTH_HEADER, &self.endpoints.auth_token)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
