//! Compute module
//!
//! The handle a host application works with: register handlers, wait for
//! responsiveness, look up source credentials and start the dispatch loop.
//! Handles are cheap to clone and share all state, so handlers can be
//! registered from anywhere, before or after the loop has started.

use std::future::Future;
use std::sync::{Arc, Once};

use anyhow::Context;
use compute_module_client::ModuleClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::bootstrap::{self, BootstrapError, BootstrapOptions};
use crate::config::Config;
use crate::credentials::{CredentialError, SourceCredentials};
use crate::repository::{HttpJobRepository, JobRepository};
use crate::scheduler::{HandlerRegistry, HandlerResult, HandlerSchema, JobPoller, PollPolicy, Responsiveness};

struct ModuleState {
    config: Config,
    instance_id: Uuid,
    registry: Arc<HandlerRegistry>,
    responsiveness: Arc<Responsiveness>,
    credentials: SourceCredentials,
    schema_publication: Once,
}

/// A compute module instance
#[derive(Clone)]
pub struct ComputeModule {
    state: Arc<ModuleState>,
}

impl ComputeModule {
    /// Creates a module; nothing happens until [`ComputeModule::start`]
    pub fn new(config: Config) -> Self {
        let credentials = SourceCredentials::new(config.source_credentials_path.clone());
        Self {
            state: Arc::new(ModuleState {
                config,
                instance_id: Uuid::new_v4(),
                registry: Arc::new(HandlerRegistry::new()),
                responsiveness: Arc::new(Responsiveness::new()),
                credentials,
                schema_publication: Once::new(),
            }),
        }
    }

    /// Creates a module configured from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config::from_env().context("Failed to load configuration")?;
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Random id distinguishing this instance in logs
    pub fn instance_id(&self) -> Uuid {
        self.state.instance_id
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    // =============================================================================
    // Handler Registration
    // =============================================================================

    /// Adds the handler for a query type
    ///
    /// Only one handler exists per query type; registering again replaces it.
    pub fn register<F, Fut>(&self, query_type: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.state.registry.register(query_type, Arc::new(handler), None);
        self
    }

    /// Adds a handler and records its signature for the schema catalog
    ///
    /// # Arguments
    /// * `query_type` - Query type to respond to
    /// * `input` - JSON Schema of the query, an object type
    /// * `output` - JSON Schema of the response
    /// * `handler` - Function to run when the query is received
    pub fn register_with_schema<F, Fut>(
        &self,
        query_type: impl Into<String>,
        input: Value,
        output: Value,
        handler: F,
    ) -> &Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.state.registry.register(
            query_type,
            Arc::new(handler),
            Some(HandlerSchema { input, output }),
        );
        self
    }

    /// Adds a handler working on typed queries and responses
    ///
    /// A query that does not deserialize into `Q` fails the job like any
    /// other handler error.
    pub fn register_typed<Q, R, F, Fut>(&self, query_type: impl Into<String>, handler: F) -> &Self
    where
        Q: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let query_type = query_type.into();
        let name = query_type.clone();
        let handler = Arc::new(handler);

        self.register(query_type, move |query: Value| {
            let handler = Arc::clone(&handler);
            let name = name.clone();
            async move {
                let query: Q = serde_json::from_value(query)
                    .with_context(|| format!("Invalid query for {}", name))?;
                let response = (*handler)(query).await?;
                serde_json::to_value(response).context("Failed to serialize response")
            }
        })
    }

    /// Sets the handler for queries without a dedicated handler
    ///
    /// Takes effect on the next unmatched job, even while the loop is running.
    pub fn set_default<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.state.registry.set_default(Arc::new(handler));
        self
    }

    // =============================================================================
    // Responsiveness
    // =============================================================================

    /// Runs `callback` once the first job has been received
    ///
    /// Fires immediately if the module is already responsive.
    pub fn on_responsive(&self, callback: impl FnOnce() + Send + 'static) -> &Self {
        self.state.responsiveness.on_responsive(callback);
        self
    }

    pub fn is_responsive(&self) -> bool {
        self.state.responsiveness.is_responsive()
    }

    // =============================================================================
    // Source Credentials
    // =============================================================================

    /// Looks up a mounted source credential
    pub async fn get_credential(
        &self,
        source_api_name: &str,
        credential_name: &str,
    ) -> Result<Option<String>, CredentialError> {
        self.state
            .credentials
            .get_credential(source_api_name, credential_name)
            .await
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Bootstraps the connection and runs the dispatch loop
    ///
    /// Only returns in development mode or when bootstrap fails.
    pub async fn start(&self) -> anyhow::Result<()> {
        let span = tracing::info_span!("compute_module", instance_id = %self.state.instance_id);
        self.bootstrap_and_run().instrument(span).await
    }

    async fn bootstrap_and_run(&self) -> anyhow::Result<()> {
        let config = &self.state.config;
        if config.development {
            warn!("Inactive module - running in dev mode");
            return Ok(());
        }

        let source = config.connection.as_ref().ok_or(BootstrapError::NotConfigured)?;
        let endpoints = bootstrap::resolve_endpoints(source, BootstrapOptions::from(config))
            .await
            .context("Failed to bootstrap connection")?;
        info!("Connection information loaded");
        debug!("Endpoints: {:?}", endpoints);

        let client = ModuleClient::new(endpoints).context("Failed to create transport client")?;
        self.run_with(Arc::new(HttpJobRepository::new(client))).await;
        Ok(())
    }

    /// Runs the dispatch loop against an already constructed transport
    ///
    /// The schema catalog is published at most once per module, however many
    /// times the loop is started.
    pub async fn run_with(&self, repository: Arc<dyn JobRepository>) {
        self.state
            .schema_publication
            .call_once(|| self.publish_schemas_when_responsive(Arc::clone(&repository)));

        let poller = JobPoller::new(
            repository,
            Arc::clone(&self.state.registry),
            Arc::clone(&self.state.responsiveness),
        )
        .with_policy(PollPolicy::from(&self.state.config))
        .with_max_in_flight(self.state.config.max_in_flight_jobs);

        poller.run().await
    }

    /// Posts the schema catalog once, right after the module became responsive
    fn publish_schemas_when_responsive(&self, repository: Arc<dyn JobRepository>) {
        let registry = Arc::clone(&self.state.registry);

        self.state.responsiveness.on_responsive(move || {
            let catalog = registry.catalog();
            if catalog.is_empty() {
                debug!("No handler schemas registered, skipping schema catalog");
                return;
            }

            tokio::spawn(
                async move {
                    match repository.post_schema_catalog(&catalog).await {
                        Ok(()) => info!("Published {} handler schema(s)", catalog.len()),
                        Err(e) => error!("Failed to publish schema catalog: {}", e),
                    }
                }
                .in_current_span(),
            );
        });
    }
}
