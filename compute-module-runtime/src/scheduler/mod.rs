//! Scheduler layer for the runtime
//!
//! This layer owns the dispatch loop: polling the service for jobs, routing
//! each job to its handler and tracking when the module became responsive.

pub mod poller;
pub mod registry;
pub mod responsiveness;

pub use poller::{DispatchError, JobPoller, PollOutcome, PollPolicy};
pub use registry::{DefaultHandler, HandlerRegistry, HandlerResult, HandlerSchema, QueryHandler};
pub use responsiveness::Responsiveness;
