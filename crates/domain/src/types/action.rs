//! Terminal state labels of a synchronization run.

use serde::{Deserialize, Serialize};

use crate::impl_label_conversions;

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Patched,
    Unchanged,
    Deleted,
    Failed,
    Cancelled,
}

impl_label_conversions!(SyncAction {
    Created => "created",
    Patched => "patched",
    Unchanged => "unchanged",
    Deleted => "deleted",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl SyncAction {
    /// Whether the action changed remote state.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Created | Self::Patched | Self::Deleted)
    }
}
