//! Handler registry
//!
//! Maps query types to the handlers that answer them. The registry is shared
//! between the host application and the dispatch loop and may be mutated
//! while the loop runs; every dispatch resolves against the live state.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use compute_module_core::dto::schema::SchemaCatalogEntry;
use compute_module_core::schema::translate_schema;
use dashmap::DashMap;
use serde_json::Value;

/// Result of a handler invocation
pub type HandlerResult = anyhow::Result<Value>;

/// Answers jobs of one query type
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn handle(&self, query: Value) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> QueryHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, query: Value) -> HandlerResult {
        (self)(query).await
    }
}

/// Fallback for jobs whose query type has no handler
#[async_trait]
pub trait DefaultHandler: Send + Sync {
    async fn handle(&self, query: Value, query_type: String) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> DefaultHandler for F
where
    F: Fn(Value, String) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, query: Value, query_type: String) -> HandlerResult {
        (self)(query, query_type).await
    }
}

/// Input and output type descriptions announced for a handler
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerSchema {
    pub input: Value,
    pub output: Value,
}

struct Registration {
    handler: Arc<dyn QueryHandler>,
    schema: Option<HandlerSchema>,
}

/// Where a job is routed to
pub enum Route {
    Handler(Arc<dyn QueryHandler>),
    Default(Arc<dyn DefaultHandler>),
    Unroutable,
}

/// Concurrent query type → handler map plus the default handler
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Registration>,
    default: RwLock<Option<Arc<dyn DefaultHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; a previous handler for the same query type is replaced
    pub fn register(
        &self,
        query_type: impl Into<String>,
        handler: Arc<dyn QueryHandler>,
        schema: Option<HandlerSchema>,
    ) {
        self.handlers
            .insert(query_type.into(), Registration { handler, schema });
    }

    /// Replaces the default handler
    pub fn set_default(&self, handler: Arc<dyn DefaultHandler>) {
        *self.default.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Exact match first, then the default handler
    pub fn resolve(&self, query_type: &str) -> Route {
        if let Some(registration) = self.handlers.get(query_type) {
            return Route::Handler(Arc::clone(&registration.handler));
        }

        match self
            .default
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(handler) => Route::Default(Arc::clone(handler)),
            None => Route::Unroutable,
        }
    }

    /// Catalog entries for every handler registered with a schema, sorted by name
    pub fn catalog(&self) -> Vec<SchemaCatalogEntry> {
        let mut entries: Vec<SchemaCatalogEntry> = self
            .handlers
            .iter()
            .filter_map(|entry| {
                entry
                    .schema
                    .as_ref()
                    .map(|schema| translate_schema(entry.key(), &schema.input, &schema.output))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
