//! Data Transfer Objects exchanged with the job-issuing service
//!
//! DTOs mirror the wire format exactly; domain types are unwrapped from them
//! at the transport boundary.

pub mod job;
pub mod schema;
