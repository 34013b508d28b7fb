//! Schema catalog endpoint

use crate::error::Result;
use crate::ModuleClient;
use compute_module_core::dto::schema::SchemaCatalogEntry;
use reqwest::Method;
use tracing::warn;

impl ModuleClient {
    /// Post the full schema catalog in one request
    ///
    /// Does nothing when the endpoints carry no schema URL.
    pub async fn post_schema_catalog(&self, entries: &[SchemaCatalogEntry]) -> Result<()> {
        let Some(url) = self.endpoints.post_schema_url.as_deref() else {
            warn!("No schema endpoint configured, skipping catalog of {} entries", entries.len());
            return Ok(());
        };

        let response = self.request(Method::POST, url).json(entries).send().await?;

        self.handle_empty_response(response).await
    }
}
