//! Source credentials
//!
//! Credentials for external sources are mounted as a JSON file mapping a
//! source API name to its credential names and secret values. The file may
//! appear long after startup; it is awaited with a directory watch, read
//! once, and cached for the lifetime of the process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::watch::{self, WatchError};

/// Source API name → credential name → secret
pub type SourceCredentialsFile = HashMap<String, HashMap<String, String>>;

/// Errors returned by [`SourceCredentials::get_credential`]
///
/// A missing source or credential name is not an error; it yields `None`.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credentials path was ever configured
    #[error("source credentials are not configured, set SOURCE_CREDENTIALS to the credentials file path")]
    NotConfigured,

    #[error("source credentials unavailable: {0}")]
    Unavailable(#[from] WatchError),
}

/// Produces the credentials map
#[async_trait]
pub trait CredentialLoader: Send + Sync {
    async fn load(&self) -> Result<SourceCredentialsFile, CredentialError>;
}

/// Loads credentials from a mounted file, waiting for it to appear
pub struct FileCredentialLoader {
    path: PathBuf,
}

impl FileCredentialLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialLoader for FileCredentialLoader {
    async fn load(&self) -> Result<SourceCredentialsFile, CredentialError> {
        debug!("Loading source credentials from {}", self.path.display());
        let credentials: SourceCredentialsFile = watch::wait_for_json(&self.path).await?;
        info!("Loaded credentials for {} source(s)", credentials.len());
        Ok(credentials)
    }
}

/// Lazily resolved, cached source credentials
///
/// Concurrent first calls share a single load. A failed load is not cached,
/// so a later call tries again.
pub struct SourceCredentials {
    loader: Option<Arc<dyn CredentialLoader>>,
    cache: OnceCell<SourceCredentialsFile>,
}

impl SourceCredentials {
    /// Credentials backed by the file at `path`; `None` means not configured
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            loader: path.map(|p| Arc::new(FileCredentialLoader::new(p)) as Arc<dyn CredentialLoader>),
            cache: OnceCell::new(),
        }
    }

    /// Credentials produced by a custom loader
    pub fn with_loader(loader: impl CredentialLoader + 'static) -> Self {
        Self {
            loader: Some(Arc::new(loader)),
            cache: OnceCell::new(),
        }
    }

    /// Looks up a single credential
    ///
    /// # Arguments
    /// * `source_api_name` - Name of the source the credential belongs to
    /// * `credential_name` - Name of the credential within that source
    ///
    /// # Returns
    /// The secret, or `None` if the source or credential does not exist
    pub async fn get_credential(
        &self,
        source_api_name: &str,
        credential_name: &str,
    ) -> Result<Option<String>, CredentialError> {
        let loader = self.loader.as_ref().ok_or(CredentialError::NotConfigured)?;

        let credentials = self.cache.get_or_try_init(|| loader.load()).await?;

        Ok(credentials
            .get(source_api_name)
            .and_then(|source| source.get(credential_name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CredentialLoader for CountingLoader {
        async fn load(&self) -> Result<SourceCredentialsFile, CredentialError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(serde_json::from_str(
                r#"{"api1": {"key1": "value1", "key2": "value2"}, "api2": {"key1": "value3"}}"#,
            )
            .unwrap())
        }
    }

    fn counting() -> (SourceCredentials, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let credentials = SourceCredentials::with_loader(CountingLoader {
            loads: Arc::clone(&loads),
        });
        (credentials, loads)
    }

    #[tokio::test]
    async fn test_returns_credential() {
        let (credentials, _) = counting();
        let value = credentials.get_credential("api1", "key1").await.unwrap();
        assert_eq!(value.as_deref(), Some("value1"));
    }

    #[tokio::test]
    async fn test_missing_source_or_key_is_none() {
        let (credentials, _) = counting();
        assert_eq!(credentials.get_credential("missingApi", "key1").await.unwrap(), None);
        assert_eq!(credentials.get_credential("api1", "missingKey").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_loads_once_and_caches() {
        let (credentials, loads) = counting();
        credentials.get_credential("api1", "key1").await.unwrap();
        credentials.get_credential("api1", "key2").await.unwrap();
        credentials.get_credential("api2", "key1").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_load() {
        let (credentials, loads) = counting();

        let (a, b) = tokio::join!(
            credentials.get_credential("api1", "key1"),
            credentials.get_credential("api1", "key1"),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_configured_is_an_error() {
        let credentials = SourceCredentials::new(None);
        let result = credentials.get_credential("api1", "key1").await;
        assert!(matches!(result, Err(CredentialError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_reads_mounted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"weather": {"apiKey": "s3cret"}}"#).unwrap();

        let credentials = SourceCredentials::new(Some(path.clone()));
        assert_eq!(
            credentials.get_credential("weather", "apiKey").await.unwrap().as_deref(),
            Some("s3cret")
        );

        // Cached: later changes to the file are not observed.
        std::fs::write(&path, r#"{"weather": {"apiKey": "rotated"}}"#).unwrap();
        assert_eq!(
            credentials.get_credential("weather", "apiKey").await.unwrap().as_deref(),
            Some("s3cret")
        );
    }
}
