//! Infrastructure layer: background jobs, optimistic concurrency, record storage, config.

pub mod config;
pub mod consistency;
pub mod jobs;
pub mod record_store;
