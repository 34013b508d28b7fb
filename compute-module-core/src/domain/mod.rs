//! Core domain types
//!
//! These types represent the units the runtime works with: jobs fetched from
//! the remote service and the connection parameters used to reach it.

pub mod connection;
pub mod job;
