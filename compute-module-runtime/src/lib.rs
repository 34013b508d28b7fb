//! Compute Module Runtime
//!
//! Client-side runtime for compute modules: it learns how to reach the
//! service, long-polls for jobs, dispatches each job to the handler
//! registered for its query type and posts the handler's result back.
//!
//! Architecture:
//! - Configuration: Load settings from environment or explicit values
//! - Bootstrap: Resolve connection parameters once the runtime mounts them
//! - Repositories: HTTP communication with the service (jobs, schemas)
//! - Scheduler: Handler registry, responsiveness and the dispatch loop
//! - Module: The handle host applications register handlers on

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod module;
pub mod repository;
pub mod scheduler;
pub mod watch;

pub use config::{Config, ConnectionSource};
pub use credentials::CredentialError;
pub use module::ComputeModule;
pub use scheduler::{HandlerResult, HandlerSchema};
