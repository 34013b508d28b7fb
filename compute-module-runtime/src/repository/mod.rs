//! Repository layer
//!
//! Repositories abstract communication with the job-issuing service. The
//! dispatch loop only sees the trait, which keeps it testable without a
//! network.

mod jobs;

// Re-export traits
pub use jobs::JobRepository;

// Re-export implementations
pub use jobs::HttpJobRepository;
