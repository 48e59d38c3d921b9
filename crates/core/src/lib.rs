//! # erpsync Core
//!
//! Pure synchronization logic. No HTTP.
//!
//! This crate contains:
//! - The field-diff engine (patch decision, update scrubbing)
//! - OData filter, URL and page helpers
//! - Port interfaces for collaborators (credentials, events, payloads)
//!
//! ## Architecture Principles
//! - Only depends on `erpsync-domain`
//! - All external effects via traits
//! - Pure, testable logic

pub mod sync;

pub use sync::diff::{is_patch_required, patch_body, remove_fields, remove_fields_from};
pub use sync::ports::{CredentialProvider, EventSink, PayloadProducer};
