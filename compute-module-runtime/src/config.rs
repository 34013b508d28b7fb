//! Runtime configuration
//!
//! Defines all configurable parameters for the runtime: where connection
//! parameters come from, where source credentials are mounted, and the
//! cadence of the dispatch loop.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the connection descriptor path
pub const CONNECTION_ENV_VAR: &str = "CONNECTION_TO_RUNTIME";

/// Environment variable holding the source credentials path
pub const SOURCE_CREDENTIALS_ENV_VAR: &str = "SOURCE_CREDENTIALS";

/// Where the runtime learns its connection parameters from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    /// JSON descriptor file polled until it becomes readable
    Descriptor(PathBuf),
    /// Endpoint URIs from the environment, token and CA material from files
    Environment {
        get_job_uri: String,
        post_result_uri: String,
        post_schema_uri: Option<String>,
        auth_token_path: PathBuf,
        ca_path: Option<PathBuf>,
    },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection parameters source; may only be absent in development mode
    pub connection: Option<ConnectionSource>,

    /// Mounted source credentials file, if the module uses sources
    pub source_credentials_path: Option<PathBuf>,

    /// Development mode leaves the module inactive
    pub development: bool,

    /// Delay after a poll that returned no job
    pub poll_interval: Duration,

    /// Upper bound of the backoff applied after consecutive fetch failures.
    /// Zero keeps retrying immediately.
    pub error_backoff_max: Duration,

    /// How often the connection descriptor is re-read while missing
    pub bootstrap_poll_interval: Duration,

    /// Attempts before bootstrap gives up
    pub bootstrap_max_attempts: u32,

    /// Cap on concurrently running handlers; `None` is unbounded
    pub max_in_flight_jobs: Option<usize>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(connection: ConnectionSource) -> Self {
        Self {
            connection: Some(connection),
            source_credentials_path: None,
            development: false,
            poll_interval: Duration::ZERO,
            error_backoff_max: Duration::ZERO,
            bootstrap_poll_interval: Duration::from_millis(100),
            bootstrap_max_attempts: 3000, // 5 minutes at the default interval
            max_in_flight_jobs: None,
        }
    }

    /// Configuration for local development, no connection is made
    pub fn development() -> Self {
        Self {
            connection: None,
            development: true,
            ..Self::new(ConnectionSource::Descriptor(PathBuf::new()))
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CONNECTION_TO_RUNTIME (descriptor path) or GET_JOB_URI + POST_RESULT_URI
    ///   + MODULE_AUTH_TOKEN (token file path), with optional POST_SCHEMA_URI
    ///   and DEFAULT_CA_PATH
    /// - SOURCE_CREDENTIALS (optional, credentials file path)
    /// - COMPUTE_MODULE_MODE (optional, `development` disables the module)
    /// - POLL_INTERVAL_MS (optional, default: 0)
    /// - ERROR_BACKOFF_MAX_MS (optional, default: 0)
    /// - BOOTSTRAP_POLL_INTERVAL_MS (optional, default: 100)
    /// - BOOTSTRAP_MAX_ATTEMPTS (optional, default: 3000)
    /// - MAX_IN_FLIGHT_JOBS (optional, default: unbounded)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let development = var("COMPUTE_MODULE_MODE")
            .map(|mode| mode.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        let connection = if let Some(path) = var(CONNECTION_ENV_VAR) {
            Some(ConnectionSource::Descriptor(PathBuf::from(path)))
        } else if let (Some(get_job_uri), Some(post_result_uri)) =
            (var("GET_JOB_URI"), var("POST_RESULT_URI"))
        {
            let auth_token_path = var("MODULE_AUTH_TOKEN").ok_or_else(|| {
                anyhow::anyhow!("MODULE_AUTH_TOKEN environment variable not set")
            })?;
            Some(ConnectionSource::Environment {
                get_job_uri,
                post_result_uri,
                post_schema_uri: var("POST_SCHEMA_URI"),
                auth_token_path: PathBuf::from(auth_token_path),
                ca_path: var("DEFAULT_CA_PATH").map(PathBuf::from),
            })
        } else {
            None
        };

        if connection.is_none() && !development {
            anyhow::bail!(
                "{} environment variable not set, please set it to the path of the connection file",
                CONNECTION_ENV_VAR
            );
        }

        let millis = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match var(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| anyhow::anyhow!("{} must be a number of milliseconds, got {:?}", key, v)),
                None => Ok(Duration::from_millis(default)),
            }
        };

        let bootstrap_max_attempts = match var("BOOTSTRAP_MAX_ATTEMPTS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("BOOTSTRAP_MAX_ATTEMPTS must be a number, got {:?}", v))?,
            None => 3000,
        };

        let max_in_flight_jobs = match var("MAX_IN_FLIGHT_JOBS") {
            Some(v) => Some(
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("MAX_IN_FLIGHT_JOBS must be a number, got {:?}", v))?,
            ),
            None => None,
        };

        Ok(Self {
            connection,
            source_credentials_path: var(SOURCE_CREDENTIALS_ENV_VAR).map(PathBuf::from),
            development,
            poll_interval: millis("POLL_INTERVAL_MS", 0)?,
            error_backoff_max: millis("ERROR_BACKOFF_MAX_MS", 0)?,
            bootstrap_poll_interval: millis("BOOTSTRAP_POLL_INTERVAL_MS", 100)?,
            bootstrap_max_attempts,
            max_in_flight_jobs,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.connection {
            None if !self.development => {
                anyhow::bail!("a connection source is required outside development mode")
            }
            Some(ConnectionSource::Descriptor(path)) if path.as_os_str().is_empty() => {
                anyhow::bail!("connection descriptor path cannot be empty")
            }
            Some(ConnectionSource::Environment {
                get_job_uri,
                post_result_uri,
                ..
            }) => {
                for uri in [get_job_uri, post_result_uri] {
                    if !uri.starts_with("http://") && !uri.starts_with("https://") {
                        anyhow::bail!("endpoint {:?} must start with http:// or https://", uri);
                    }
                }
            }
            _ => {}
        }

        if self.bootstrap_max_attempts == 0 {
            anyhow::bail!("bootstrap_max_attempts must be greater than 0");
        }

        if self.max_in_flight_jobs == Some(0) {
            anyhow::bail!("max_in_flight_jobs must be greater than 0");
        }

        Ok(())
    }
}
