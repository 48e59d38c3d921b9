//! Network-facing synchronization: collection reads, upserts and batches

pub mod batch;
pub mod pagination;
pub mod upsert;

pub use batch::{run_batch, BatchFailure, BatchReport};
pub use pagination::PaginationReader;
pub use upsert::{UpsertError, UpsertOutcome, Upserter};
