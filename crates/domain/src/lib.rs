//! # erpsync Domain
//!
//! Data model shared by every layer of the synchronization engine.
//!
//! This crate contains:
//! - Record model (`FieldValue`, `Record`, `RecordCollection`)
//! - Diff exclusion policy and entity descriptors
//! - Engine configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other erpsync crates
//! - No I/O; pure data structures and their invariants

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
