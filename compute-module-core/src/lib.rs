//! Compute Module Core
//!
//! Core types shared by the compute module client and runtime.
//!
//! This crate contains:
//! - Domain types: jobs and connection parameters
//! - DTOs: wire representations exchanged with the job-issuing service
//! - Schema translation: JSON type descriptions to the schema catalog format

pub mod domain;
pub mod dto;
pub mod schema;
