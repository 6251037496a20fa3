//! SPF Common Library
//!
//! Shared code for the SPF ingress services:
//! - Article, package and ledger records
//! - Database models, repository and the in-memory store
//! - Object storage client (S3/MinIO)
//! - Task queue client (SQS)
//! - Error types and handling
//! - Configuration management
//! - Acting-user context for the HTTP front end
//! - Metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod queue;
pub mod records;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{InMemoryStore, MetadataStore, Repository};
pub use errors::{AppError, Result};
pub use storage::ObjectStorage;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
