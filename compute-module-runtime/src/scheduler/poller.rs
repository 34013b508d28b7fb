//! Job poller
//!
//! Fetches jobs from the service and dispatches each one to its handler.
//! Handlers run in their own tasks and post their result when done; the loop
//! moves on to the next fetch without waiting for them. No per-iteration
//! failure ever stops the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use compute_module_client::TransportError;
use compute_module_core::domain::job::Job;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::Config;
use crate::repository::JobRepository;
use crate::scheduler::registry::{HandlerRegistry, HandlerResult, Route};
use crate::scheduler::responsiveness::Responsiveness;

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Per-iteration failures, logged at the loop boundary
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to fetch job: {0}")]
    Fetch(#[source] TransportError),

    #[error("handler for query type {query_type} failed on job {job_id}: {error:#}")]
    Handler {
        job_id: String,
        query_type: String,
        error: anyhow::Error,
    },

    #[error("no listener for query type {query_type} (job {job_id})")]
    Unroutable { job_id: String, query_type: String },

    #[error("failed to post result for job {job_id}: {source}")]
    PostResult {
        job_id: String,
        #[source]
        source: TransportError,
    },
}

/// Loop cadence
#[derive(Debug, Clone, Copy, Default)]
pub struct PollPolicy {
    /// Delay after a poll that returned no job
    pub interval: Duration,
    /// Upper bound of the exponential backoff after consecutive fetch
    /// failures; zero retries immediately
    pub error_backoff_max: Duration,
}

impl PollPolicy {
    const ERROR_BACKOFF_INITIAL: Duration = Duration::from_millis(100);

    /// Delay before the next fetch after `failures` consecutive fetch errors
    pub fn backoff(&self, failures: u32) -> Duration {
        if self.error_backoff_max.is_zero() || failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (failures - 1).min(16);
        Self::ERROR_BACKOFF_INITIAL
            .saturating_mul(factor)
            .min(self.error_backoff_max)
    }
}

impl From<&Config> for PollPolicy {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            error_backoff_max: config.error_backoff_max,
        }
    }
}

/// What a single iteration did
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing to do right now
    Idle,
    /// The job was handed to a handler task
    Dispatched(JoinHandle<()>),
    /// No handler and no default handler; the job was dropped
    Unroutable,
    /// The fetch itself failed
    FetchFailed,
}

/// Job poller that continuously fetches and dispatches jobs
pub struct JobPoller {
    repository: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    responsiveness: Arc<Responsiveness>,
    policy: PollPolicy,
    semaphore: Option<Arc<Semaphore>>,
}

impl JobPoller {
    /// Creates a new job poller
    ///
    /// # Arguments
    /// * `repository` - Transport to the service
    /// * `registry` - Live handler registry shared with the host
    /// * `responsiveness` - Flag flipped on the first fetched job
    pub fn new(
        repository: Arc<dyn JobRepository>,
        registry: Arc<HandlerRegistry>,
        responsiveness: Arc<Responsiveness>,
    ) -> Self {
        Self {
            repository,
            registry,
            responsiveness,
            policy: PollPolicy::default(),
            semaphore: None,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Caps the number of handlers running at once; the loop waits for a
    /// free slot before dispatching the next job
    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.semaphore = max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Starts the polling loop; never returns
    pub async fn run(&self) {
        info!(
            "Starting job poller (interval: {:?}, max in flight: {})",
            self.policy.interval,
            self.semaphore
                .as_ref()
                .map(|s| s.available_permits().to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );

        let mut failures = 0u32;

        loop {
            match self.poll_once().await {
                PollOutcome::Idle => {
                    failures = 0;
                    if !self.policy.interval.is_zero() {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
                PollOutcome::FetchFailed => {
                    failures = failures.saturating_add(1);
                    let delay = self.policy.backoff(failures);
                    if !delay.is_zero() {
                        warn!("{} consecutive fetch failures, retrying in {:?}", failures, delay);
                        tokio::time::sleep(delay).await;
                    }
                }
                PollOutcome::Dispatched(_) | PollOutcome::Unroutable => failures = 0,
            }
        }
    }

    /// Performs a single fetch and dispatch
    pub async fn poll_once(&self) -> PollOutcome {
        let job = match self.repository.fetch_job().await {
            Ok(Some(job)) => job,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => {
                let kind = failure_kind(&e);
                let status = e.status();
                let err = DispatchError::Fetch(e);
                error!(kind, status, "Error running module: {}", err);
                return PollOutcome::FetchFailed;
            }
        };

        if self.responsiveness.mark_responsive() {
            info!("First job received, module is responsive");
        }

        info!(job_id = %job.job_id, query_type = %job.query_type, "Job received");

        let Job {
            job_id,
            query_type,
            query,
        } = job;

        let invocation: HandlerFuture = match self.registry.resolve(&query_type) {
            Route::Handler(handler) => Box::pin(async move { handler.handle(query).await }),
            Route::Default(handler) => {
                let query_type = query_type.clone();
                Box::pin(async move { handler.handle(query, query_type).await })
            }
            Route::Unroutable => {
                let err = DispatchError::Unroutable { job_id, query_type };
                error!("{}", err);
                return PollOutcome::Unroutable;
            }
        };

        let permit = match &self.semaphore {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => None, // never closed
            },
            None => None,
        };

        PollOutcome::Dispatched(self.spawn_job_task(job_id, query_type, invocation, permit))
    }

    /// Spawns a task that runs the handler and posts its result
    ///
    /// The handler runs in a nested task so that a panic is reported here
    /// instead of escaping silently.
    fn spawn_job_task(
        &self,
        job_id: String,
        query_type: String,
        invocation: HandlerFuture,
        permit: Option<OwnedSemaphorePermit>,
    ) -> JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let span = tracing::info_span!("job", job_id = %job_id, query_type = %query_type);

        tokio::spawn(
            async move {
                let _permit = permit;

                let response = match tokio::spawn(invocation.in_current_span()).await {
                    Ok(Ok(response)) => response,
                    Ok(Err(error)) => {
                        let err = DispatchError::Handler {
                            job_id,
                            query_type,
                            error,
                        };
                        error!("{}", err);
                        return;
                    }
                    Err(join_error) => {
                        let err = DispatchError::Handler {
                            job_id,
                            query_type,
                            error: anyhow::anyhow!("handler task aborted: {}", join_error),
                        };
                        error!("{}", err);
                        return;
                    }
                };

                match repository.post_result(&job_id, &response).await {
                    Ok(()) => debug!("Result posted for job {}", job_id),
                    Err(source) => {
                        let err = DispatchError::PostResult { job_id, source };
                        error!("{}", err);
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Coarse class of a transport failure, recorded with the fetch error log
fn failure_kind(err: &TransportError) -> &'static str {
    if err.is_client_error() {
        "client error"
    } else if err.is_server_error() {
        "server error"
    } else if matches!(err, TransportError::RequestFailed(_)) {
        "network error"
    } else {
        "protocol error"
    }
}
