//! # erpsync Infrastructure
//!
//! Network-facing half of the synchronization engine.
//!
//! This crate contains:
//! - The HTTP transport, request cloner and send pipeline
//! - The single-flight bearer token cache
//! - The pagination reader, upsert orchestrator and batch runner
//! - Configuration loading and logging bootstrap
//!
//! ## Architecture
//! - Implements the collaborator ports defined in `erpsync-core`
//! - Depends on `erpsync-domain` and `erpsync-core`
//! - Contains all "impure" code (HTTP, environment, files)

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod sync;

// Re-export commonly used items
pub use auth::TokenCache;
pub use errors::InfraError;
pub use http::{
    HttpClient, HttpReply, SendError, SendErrorCategory, SendOptions, SendPipeline,
};
pub use observability::{init_tracing, LogFormat, TracingEventSink};
pub use sync::{
    run_batch, BatchFailure, BatchReport, PaginationReader, UpsertError, UpsertOutcome, Upserter,
};
