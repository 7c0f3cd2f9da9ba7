//! Deferred reference resolutions.

use crate::codec::EnrichmentHook;
use crate::models::{FieldDescriptor, ObjectRef};

/// A reference field whose target(s) did not exist when its row was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    /// Object owning the field.
    pub owner: ObjectRef,
    /// The reference field.
    pub field: FieldDescriptor,
    /// Target ids in stored order.
    pub target_ids: Vec<String>,
}

impl PendingReference {
    /// Creates a pending resolution.
    #[must_use]
    pub fn new(owner: ObjectRef, field: FieldDescriptor, target_ids: Vec<String>) -> Self {
        Self {
            owner,
            field,
            target_ids,
        }
    }
}

/// A record key whose enrichment label matched nothing when its row was read.
///
/// Finalization looks the label up again and rewrites `hook.source_key` of
/// mapping `index` in the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelink {
    /// Object owning the record field.
    pub owner: ObjectRef,
    /// The record or records field.
    pub field: FieldDescriptor,
    /// Position of the mapping in the decoded value.
    pub index: usize,
    /// Hook naming the key and the searched types.
    pub hook: EnrichmentHook,
    /// Target id read from the label column.
    pub label: String,
    /// Side-sheet the label came from.
    pub sheet: String,
}

/// Outcome of the finalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeSummary {
    /// Pending fields retried.
    pub retried: usize,
    /// Fields whose targets were all found.
    pub resolved: usize,
    /// Target ids still missing.
    pub unresolved_targets: usize,
    /// Record keys retried through their enrichment label.
    pub relinks_retried: usize,
    /// Record keys whose label matched nothing.
    pub relinks_unresolved: usize,
}
