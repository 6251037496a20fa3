//! SPF ingress core
//!
//! Takes article packages from submission to durable storage:
//! - Storage path planning and object storage registration
//! - Zip package reading and SciELO PS metadata extraction
//! - Content extraction with asset href rewriting
//! - Article metadata synchronization and files versioning
//! - The event ledger and the pipelines that bracket every run with it
//! - The queue-driven worker

pub mod errors;
pub mod extractor;
pub mod ledger;
pub mod package;
pub mod paths;
pub mod pipelines;
pub mod registrar;
pub mod synchronizer;
pub mod versioner;
pub mod worker;

pub use errors::{IngressError, PackagingError};
pub use pipelines::Pipelines;
pub use worker::Worker;
