//! Connection bootstrap
//!
//! Discovers the transport parameters before the dispatch loop can start.
//! The descriptor file is written by an external process some time after
//! startup, so reading it is retried until it parses or the attempt budget
//! runs out. Missing, partially written and malformed files all count as
//! "not ready yet".

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use compute_module_core::domain::connection::{ConnectionDescriptor, Endpoints};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConnectionSource};
use crate::watch::{self, WatchError};

/// Attempts between two progress warnings while the descriptor is missing
const WARN_EVERY: u32 = 50;

/// Errors that prevent the runtime from ever reaching the service
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The descriptor never became available within the retry budget
    #[error("connection descriptor {path} not available after {attempts} attempts: {last_error}")]
    Timeout {
        path: PathBuf,
        attempts: u32,
        last_error: String,
    },

    #[error("failed to read trust store {path}: {source}")]
    TrustStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for {what}: {source}")]
    Watch {
        what: &'static str,
        #[source]
        source: WatchError,
    },

    #[error("no connection source configured")]
    NotConfigured,
}

/// Retry budget for reading the descriptor
#[derive(Debug, Clone, Copy)]
pub struct BootstrapOptions {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl From<&Config> for BootstrapOptions {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.bootstrap_poll_interval,
            max_attempts: config.bootstrap_max_attempts,
        }
    }
}

/// Resolves the endpoints for the configured connection source
pub async fn resolve_endpoints(
    source: &ConnectionSource,
    options: BootstrapOptions,
) -> Result<Endpoints, BootstrapError> {
    match source {
        ConnectionSource::Descriptor(path) => {
            let descriptor = resolve_descriptor(path, options).await?;
            let trust_store = match descriptor.trust_store_path() {
                Some(path) => Some(tokio::fs::read(path).await.map_err(|source| {
                    BootstrapError::TrustStore {
                        path: path.to_path_buf(),
                        source,
                    }
                })?),
                None => {
                    debug!("No trust store configured, using system roots");
                    None
                }
            };
            Ok(descriptor.into_endpoints(trust_store))
        }
        ConnectionSource::Environment {
            get_job_uri,
            post_result_uri,
            post_schema_uri,
            auth_token_path,
            ca_path,
        } => {
            info!("Waiting for module auth token at {}", auth_token_path.display());
            let token = watch::wait_for_file(auth_token_path)
                .await
                .map_err(|source| BootstrapError::Watch {
                    what: "module auth token",
                    source,
                })?;

            let trust_store = match ca_path {
                Some(path) => Some(watch::wait_for_file(path).await.map_err(|source| {
                    BootstrapError::Watch {
                        what: "trust store",
                        source,
                    }
                })?),
                None => None,
            };

            Ok(Endpoints {
                get_job_url: get_job_uri.clone(),
                post_result_url: post_result_uri.clone(),
                post_schema_url: post_schema_uri.clone(),
                auth_token: String::from_utf8_lossy(&token).trim().to_string(),
                trust_store,
            })
        }
    }
}

/// Polls the descriptor file until it parses
///
/// # Arguments
/// * `path` - Descriptor location
/// * `options` - Poll interval and attempt budget
pub async fn resolve_descriptor(
    path: &Path,
    options: BootstrapOptions,
) -> Result<ConnectionDescriptor, BootstrapError> {
    poll_descriptor(path, options, |path| {
        let path = path.to_path_buf();
        async move { tokio::fs::read_to_string(path).await }
    })
    .await
}

async fn poll_descriptor<F, Fut>(
    path: &Path,
    options: BootstrapOptions,
    read: F,
) -> Result<ConnectionDescriptor, BootstrapError>
where
    F: Fn(&Path) -> Fut,
    Fut: Future<Output = std::io::Result<String>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match read(path).await {
            Ok(contents) => match serde_json::from_str::<ConnectionDescriptor>(&contents) {
                Ok(descriptor) => {
                    info!(
                        "Connection information loaded from {} after {} attempt(s)",
                        path.display(),
                        attempt
                    );
                    return Ok(descriptor);
                }
                Err(e) => format!("invalid descriptor: {}", e),
            },
            Err(e) => format!("read failed: {}", e),
        };

        if attempt >= options.max_attempts {
            return Err(BootstrapError::Timeout {
                path: path.to_path_buf(),
                attempts: attempt,
                last_error: error,
            });
        }

        if attempt % WARN_EVERY == 0 {
            warn!(
                "Connection descriptor {} still unavailable (attempt {}/{}): {}",
                path.display(),
                attempt,
                options.max_attempts,
                error
            );
        } else {
            debug!(
                "Error reading connection file (attempt {}/{}): {}",
                attempt, options.max_attempts, error
            );
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DESCRIPTOR: &str = r#"{
        "host": "localhost",
        "port": 8945,
        "getJobPath": "/job",
        "postResultPath": "/result",
        "moduleAuthToken": "token"
    }"#;

    fn options(max_attempts: u32) -> BootstrapOptions {
        BootstrapOptions {
            poll_interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_descriptor_resolves_on_fourth_attempt() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&reads);

        let descriptor = poll_descriptor(Path::new("/run/connection.json"), options(5), move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match attempt {
                    1 => Err(std::io::Error::from(std::io::ErrorKind::NotFound)),
                    2 => Ok(String::new()),
                    3 => Ok(r#"{"host": "local"#.to_string()),
                    _ => Ok(DESCRIPTOR.to_string()),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(reads.load(Ordering::SeqCst), 4);
        assert_eq!(descriptor.host, "localhost");
        assert_eq!(descriptor.trust_store_path(), None);
    }

    #[tokio::test]
    async fn test_descriptor_times_out_after_budget() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&reads);

        let result = poll_descriptor(Path::new("/run/connection.json"), options(3), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(std::io::Error::from(std::io::ErrorKind::NotFound)) }
        })
        .await;

        assert!(matches!(
            result,
            Err(BootstrapError::Timeout { attempts: 3, .. })
        ));
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resolve_descriptor_from_file_written_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.json");

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::write(&path, DESCRIPTOR).await.unwrap();
            })
        };

        let descriptor = resolve_descriptor(
            &path,
            BootstrapOptions {
                poll_interval: Duration::from_millis(10),
                max_attempts: 500,
            },
        )
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(descriptor.port, 8945);
    }

    #[tokio::test]
    async fn test_resolve_endpoints_without_trust_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.json");
        std::fs::write(&path, DESCRIPTOR).unwrap();

        let endpoints = resolve_endpoints(&ConnectionSource::Descriptor(path), options(1))
            .await
            .unwrap();

        assert_eq!(endpoints.get_job_url, "https://localhost:8945/job");
        assert_eq!(endpoints.trust_store, None);
    }

    #[tokio::test]
    async fn test_missing_trust_store_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.json");
        let descriptor = DESCRIPTOR.replace(
            r#""moduleAuthToken""#,
            r#""trustStorePath": "/nonexistent/ca.pem", "moduleAuthToken""#,
        );
        std::fs::write(&path, descriptor).unwrap();

        let result = resolve_endpoints(&ConnectionSource::Descriptor(path), options(1)).await;
        assert!(matches!(result, Err(BootstrapError::TrustStore { .. })));
    }

    #[tokio::test]
    async fn test_environment_source_reads_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "module-token\n").unwrap();

        let endpoints = resolve_endpoints(
            &ConnectionSource::Environment {
                get_job_uri: "https://runtime/job".to_string(),
                post_result_uri: "https://runtime/result".to_string(),
                post_schema_uri: Some("https://runtime/schemas".to_string()),
                auth_token_path: token_path,
                ca_path: None,
            },
            options(1),
        )
        .await
        .unwrap();

        assert_eq!(endpoints.auth_token, "module-token");
        assert_eq!(
            endpoints.post_schema_url.as_deref(),
            Some("https://runtime/schemas")
        );
    }

    #[tokio::test]
    async fn test_environment_source_waits_for_non_empty_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "").unwrap();

        let source = ConnectionSource::Environment {
            get_job_uri: "https://runtime/job".to_string(),
            post_result_uri: "https://runtime/result".to_string(),
            post_schema_uri: None,
            auth_token_path: token_path.clone(),
            ca_path: None,
        };
        let resolver = tokio::spawn(async move { resolve_endpoints(&source, options(1)).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!resolver.is_finished());

        std::fs::write(&token_path, "late-token\n").unwrap();

        let endpoints = tokio::time::timeout(Duration::from_secs(5), resolver)
            .await
            .expect("token was never picked up")
            .unwrap()
            .unwrap();
        assert_eq!(endpoints.auth_token, "late-token");
    }
}
