//! Synchronization logic that needs no network access.

pub mod diff;
pub mod odata;
pub mod ports;

pub use diff::{is_patch_required, patch_body, remove_fields, remove_fields_from};
pub use odata::{entity_url, key_filter, parse_page, quote_literal, Page};
pub use ports::{CredentialProvider, EventSink, PayloadProducer};
