//! Enrichment hooks for record side-sheets.
//!
//! Some record values store another object's `uid` under one of their keys.
//! A uid is meaningless on another site, so export adds a label column holding
//! the target's `id`, and import uses that label to find the destination
//! object and rewrite the key to its uid.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One row of the enrichment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentHook {
    /// Record field the hook applies to.
    pub field: String,
    /// Record key holding the target uid.
    pub source_key: String,
    /// Side-sheet column receiving the target id.
    pub label_column: String,
    /// Types searched, in order, when re-linking a label on import.
    #[serde(default)]
    pub target_types: Vec<String>,
}

impl EnrichmentHook {
    /// Creates a hook.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        source_key: impl Into<String>,
        label_column: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            source_key: source_key.into(),
            label_column: label_column.into(),
            target_types: vec![target_type.into()],
        }
    }

    /// Hooks for the laboratory setup record fields that carry uids.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Analyses", "service_uid", "service_id", "AnalysisService"),
            Self::new("ReferenceResults", "uid", "service_id", "AnalysisService"),
            Self::new("Licenses", "LicenseType", "client_type", "ClientType"),
        ]
    }
}

/// The configured hooks, queried by field name.
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    hooks: Vec<EnrichmentHook>,
    label_columns: HashSet<String>,
}

impl HookTable {
    /// Builds a table from hook entries.
    #[must_use]
    pub fn new(hooks: Vec<EnrichmentHook>) -> Self {
        let label_columns = hooks.iter().map(|h| h.label_column.clone()).collect();
        Self {
            hooks,
            label_columns,
        }
    }

    /// Iterates over the hooks for one record field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a EnrichmentHook> {
        self.hooks.iter().filter(move |h| h.field == field)
    }

    /// Returns whether `column` is a label column of any hook.
    #[must_use]
    pub fn is_label_column(&self, column: &str) -> bool {
        self.label_columns.contains(column)
    }

    /// Returns the number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
