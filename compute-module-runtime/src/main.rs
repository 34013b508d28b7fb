//! Example compute module
//!
//! Registers a couple of handlers and serves jobs until the process is
//! stopped. Set `COMPUTE_MODULE_MODE=development` to run without a service.

use anyhow::Result;
use compute_module_runtime::ComputeModule;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Deserialize)]
struct AddQuery {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct AddResponse {
    sum: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compute_module_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let module = ComputeModule::from_env()?;
    info!("Starting compute module {}", module.instance_id());

    module
        .register_with_schema(
            "hello",
            json!({ "type": "object", "properties": { "name": { "type": "string" } } }),
            json!({ "type": "string" }),
            |query: Value| async move {
                let name = query["name"].as_str().unwrap_or("world");
                Ok::<_, anyhow::Error>(json!(format!("Hello {}", name)))
            },
        )
        .register_typed("add", |query: AddQuery| async move {
            Ok::<_, anyhow::Error>(AddResponse { sum: query.x + query.y })
        })
        .on_responsive(|| info!("Module is responsive"));

    module.start().await
}
