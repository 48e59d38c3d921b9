//! Domain types

pub mod action;
pub mod entity;
pub mod policy;
pub mod record;

pub use action::SyncAction;
pub use entity::EntityDescriptor;
pub use policy::DiffPolicy;
pub use record::{eq_ignore_case, FieldValue, Record, RecordCollection};
