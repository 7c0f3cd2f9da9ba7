//! Reference resolution.
//!
//! The workbook stores references as plain object ids. On import each id is
//! looked up in the destination catalog, trying the field's allowed types in
//! order. Targets that do not exist yet (because their type is imported later)
//! are deferred and retried once by [`ReferenceResolver::finalize`] after every
//! type has been created. Record keys re-linked through an enrichment label
//! follow the same rule.

mod pending;

pub use pending::{FinalizeSummary, PendingReference, PendingRelink};

use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::{debug, info, instrument};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::models::{FieldValue, ObjectRef};
use crate::storage::ObjectStore;
use crate::{Error, Result};

/// Default number of cached lookups.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Resolves stored ids to live references for one import run.
///
/// Only successful lookups are cached: a miss may turn into a hit as soon
/// as the target's type is imported.
pub struct ReferenceResolver {
    cache: LruCache<(String, String), ObjectRef>,
    pending: Vec<PendingReference>,
    relinks: Vec<PendingRelink>,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ReferenceResolver {
    /// Creates a resolver with a bounded lookup cache.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            pending: Vec::new(),
            relinks: Vec::new(),
        }
    }

    /// Looks up `id`, trying `allowed_types` in order.
    ///
    /// An empty type list searches every registered type.
    pub fn resolve(
        &mut self,
        store: &dyn ObjectStore,
        allowed_types: &[String],
        id: &str,
    ) -> Option<ObjectRef> {
        if id.is_empty() {
            return None;
        }
        let all_types;
        let types: &[String] = if allowed_types.is_empty() {
            all_types = store.type_names();
            &all_types
        } else {
            allowed_types
        };

        for type_name in types {
            let key = (type_name.clone(), id.to_string());
            if let Some(hit) = self.cache.get(&key) {
                return Some(hit.clone());
            }
            if let Some(found) = store.catalog_lookup(type_name, id) {
                self.cache.put(key, found.clone());
                return Some(found);
            }
        }
        None
    }

    /// Looks up several ids, keeping their order.
    pub fn resolve_all(
        &mut self,
        store: &dyn ObjectStore,
        allowed_types: &[String],
        ids: &[String],
    ) -> Vec<Option<ObjectRef>> {
        ids.iter()
            .map(|id| self.resolve(store, allowed_types, id))
            .collect()
    }

    /// Queues a reference for the finalization pass.
    pub fn defer(&mut self, pending: PendingReference) {
        debug!(
            owner = %pending.owner,
            field = %pending.field.name,
            targets = ?pending.target_ids,
            "Deferring reference"
        );
        self.pending.push(pending);
    }

    /// Queues a record key re-link for the finalization pass.
    pub fn defer_relink(&mut self, relink: PendingRelink) {
        debug!(
            owner = %relink.owner,
            field = %relink.field.name,
            label = %relink.label,
            "Deferring record re-link"
        );
        self.relinks.push(relink);
    }

    /// Returns the queued references.
    #[must_use]
    pub fn pending(&self) -> &[PendingReference] {
        &self.pending
    }

    /// Returns the queued record re-links.
    #[must_use]
    pub fn pending_relinks(&self) -> &[PendingRelink] {
        &self.relinks
    }

    /// Retries every queued reference once.
    ///
    /// Resolved fields are set. Each target id still missing is reported as
    /// one diagnostic. A single reference with a missing target is cleared,
    /// even if the object held an older target; a multi reference is set to
    /// the targets that were found, in stored order.
    ///
    /// Queued record re-links are retried afterwards. A hit rewrites the key
    /// in the stored mapping to the target's uid; a miss is reported and the
    /// key keeps the value read from the workbook.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store rejects a field write for a reason
    /// other than a schema mismatch.
    #[instrument(skip_all, fields(pending = self.pending.len(), relinks = self.relinks.len()))]
    pub fn finalize(
        &mut self,
        store: &mut dyn ObjectStore,
        diagnostics: &mut Diagnostics,
    ) -> Result<FinalizeSummary> {
        let queued = std::mem::take(&mut self.pending);
        let mut summary = FinalizeSummary {
            retried: queued.len(),
            ..FinalizeSummary::default()
        };

        for pending in queued {
            let mut found = Vec::with_capacity(pending.target_ids.len());
            let mut missing = Vec::new();
            for id in &pending.target_ids {
                match self.resolve(&*store, &pending.field.allowed_types, id) {
                    Some(target) => found.push(target),
                    None => missing.push(id.clone()),
                }
            }

            for target_id in &missing {
                let err = Error::UnresolvedReference {
                    object_id: pending.owner.id.clone(),
                    field: pending.field.name.clone(),
                    target_id: target_id.clone(),
                };
                if let Some(diagnostic) = Diagnostic::from_error(&err) {
                    diagnostics.push(diagnostic.with_sheet(pending.owner.type_name.clone()));
                }
            }
            summary.unresolved_targets += missing.len();
            if missing.is_empty() {
                summary.resolved += 1;
            }

            let value = if pending.field.is_multi_reference() {
                FieldValue::Refs(found)
            } else {
                found.into_iter().next().map_or(FieldValue::Empty, FieldValue::Ref)
            };
            let written = store.set_field(&pending.owner, &pending.field, value);
            if let Err(err) = written {
                diagnostics.absorb(err, &pending.owner.id, &pending.owner.type_name)?;
            }
        }

        let relinks = std::mem::take(&mut self.relinks);
        summary.relinks_retried = relinks.len();
        for relink in relinks {
            let Some(target) = self.resolve(&*store, &relink.hook.target_types, &relink.label) else {
                summary.relinks_unresolved += 1;
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnresolvedReference,
                        format!(
                            "label '{}' in column '{}' matches no {}",
                            relink.label,
                            relink.hook.label_column,
                            relink.hook.target_types.join("/")
                        ),
                    )
                    .with_object(&relink.owner.id)
                    .with_field(&relink.field.name)
                    .with_sheet(&relink.sheet),
                );
                continue;
            };
            let Some(value) = relinked_value(&*store, &relink, &target) else {
                debug!(owner = %relink.owner, field = %relink.field.name, "Re-link target mapping gone");
                continue;
            };
            if let Err(err) = store.set_field(&relink.owner, &relink.field, value) {
                diagnostics.absorb(err, &relink.owner.id, &relink.sheet)?;
            }
        }

        info!(
            retried = summary.retried,
            resolved = summary.resolved,
            unresolved_targets = summary.unresolved_targets,
            relinks_retried = summary.relinks_retried,
            relinks_unresolved = summary.relinks_unresolved,
            "Finalized deferred references"
        );
        Ok(summary)
    }
}

/// Returns the stored record value with the re-linked key rewritten.
///
/// `None` when the owner, the field or the mapping no longer exists.
fn relinked_value(
    store: &dyn ObjectStore,
    relink: &PendingRelink,
    target: &ObjectRef,
) -> Option<FieldValue> {
    let mut value = store
        .object_at_path(&relink.owner.path)?
        .field(&relink.field.name)
        .clone();
    let mapping = match &mut value {
        FieldValue::Record(mapping) if relink.index == 0 => mapping,
        FieldValue::Records(mappings) => mappings.get_mut(relink.index)?,
        _ => return None,
    };
    mapping.insert(
        relink.hook.source_key.clone(),
        FieldValue::Str(target.uid.clone()),
    );
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EnrichmentHook;
    use crate::models::{FieldDescriptor, FieldKind, Record, TypeSchema};
    use crate::storage::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::provision(
            vec![
                TypeSchema::new("SamplePoint"),
                TypeSchema::new("AnalysisService"),
                TypeSchema::new("ARTemplate").with_field(
                    FieldDescriptor::new("Analyses", FieldKind::Records)
                        .with_type_name("artemplateanalyses"),
                ),
                TypeSchema::new("SampleType")
                    .with_field(FieldDescriptor::reference(
                        "SamplePoint",
                        "SampleTypeSamplePoint",
                        "SamplePoint",
                    ))
                    .with_field(
                        FieldDescriptor::reference(
                            "SamplePoints",
                            "SampleTypeSamplePoints",
                            "SamplePoint",
                        )
                        .multi(),
                    ),
            ],
            "Lab",
            "en",
        )
    }

    #[test]
    fn test_resolve_tries_types_in_order() {
        let mut store = store();
        let p1 = store.create_object("SamplePoint", "/sp", "P1").unwrap();
        let mut resolver = ReferenceResolver::new(4);
        let types = vec!["SampleType".to_string(), "SamplePoint".to_string()];
        assert_eq!(resolver.resolve(&store, &types, "P1"), Some(p1.clone()));
        assert_eq!(resolver.resolve(&store, &[], "P1"), Some(p1));
        assert_eq!(resolver.resolve(&store, &types, "P9"), None);
        assert_eq!(resolver.resolve(&store, &types, ""), None);
    }

    #[test]
    fn test_miss_is_not_cached() {
        let mut store = store();
        let mut resolver = ReferenceResolver::new(4);
        let types = vec!["SamplePoint".to_string()];
        assert!(resolver.resolve(&store, &types, "P1").is_none());
        store.create_object("SamplePoint", "/sp", "P1").unwrap();
        assert!(resolver.resolve(&store, &types, "P1").is_some());
    }

    #[test]
    fn test_finalize_sets_late_target() {
        let mut store = store();
        let schema = store.field_descriptors("SampleType").unwrap();
        let field = schema.field("SamplePoint").unwrap().clone();
        let water = store.create_object("SampleType", "/st", "water").unwrap();

        let mut resolver = ReferenceResolver::default();
        resolver.defer(PendingReference::new(water, field, vec!["P1".to_string()]));
        let p1 = store.create_object("SamplePoint", "/sp", "P1").unwrap();

        let mut diagnostics = Diagnostics::new();
        let summary = resolver.finalize(&mut store, &mut diagnostics).unwrap();
        assert_eq!(summary.resolved, 1);
        assert!(diagnostics.is_empty());
        assert_eq!(
            store.object_at_path("/st/water").unwrap().field("SamplePoint"),
            &FieldValue::Ref(p1)
        );
        assert!(resolver.pending().is_empty());
    }

    #[test]
    fn test_finalize_reports_each_missing_target() {
        let mut store = store();
        let schema = store.field_descriptors("SampleType").unwrap();
        let single = schema.field("SamplePoint").unwrap().clone();
        let multi = schema.field("SamplePoints").unwrap().clone();
        let water = store.create_object("SampleType", "/st", "water").unwrap();
        let p2 = store.create_object("SamplePoint", "/sp", "P2").unwrap();

        let mut resolver = ReferenceResolver::default();
        resolver.defer(PendingReference::new(water.clone(), single, vec!["P9".to_string()]));
        resolver.defer(PendingReference::new(
            water,
            multi,
            vec!["P1".to_string(), "P2".to_string(), "P3".to_string()],
        ));

        let mut diagnostics = Diagnostics::new();
        let summary = resolver.finalize(&mut store, &mut diagnostics).unwrap();
        assert_eq!(summary.unresolved_targets, 3);
        assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedReference), 3);

        let water = store.object_at_path("/st/water").unwrap();
        assert_eq!(water.field("SamplePoint"), &FieldValue::Empty);
        assert_eq!(water.field("SamplePoints"), &FieldValue::Refs(vec![p2]));
    }

    #[test]
    fn test_finalize_clears_stale_single_reference() {
        let mut store = store();
        let schema = store.field_descriptors("SampleType").unwrap();
        let field = schema.field("SamplePoint").unwrap().clone();
        let water = store.create_object("SampleType", "/st", "water").unwrap();
        let p1 = store.create_object("SamplePoint", "/sp", "P1").unwrap();
        store.set_field(&water, &field, FieldValue::Ref(p1)).unwrap();

        let mut resolver = ReferenceResolver::default();
        resolver.defer(PendingReference::new(water, field, vec!["P9".to_string()]));
        let mut diagnostics = Diagnostics::new();
        let summary = resolver.finalize(&mut store, &mut diagnostics).unwrap();

        assert_eq!(summary.unresolved_targets, 1);
        assert_eq!(
            store.object_at_path("/st/water").unwrap().field("SamplePoint"),
            &FieldValue::Empty
        );
    }

    fn analyses(service_uid: &str) -> FieldValue {
        let mut mapping = Record::new();
        mapping.insert("partition".to_string(), FieldValue::from("part-1"));
        mapping.insert("service_uid".to_string(), FieldValue::from(service_uid));
        FieldValue::Records(vec![Record::new(), mapping])
    }

    fn relink(owner: ObjectRef, field: FieldDescriptor, label: &str) -> PendingRelink {
        PendingRelink {
            owner,
            field,
            index: 1,
            hook: EnrichmentHook::new("Analyses", "service_uid", "service_id", "AnalysisService"),
            label: label.to_string(),
            sheet: "artemplateanalyses_values".to_string(),
        }
    }

    #[test]
    fn test_finalize_relinks_record_key_to_late_target() {
        let mut store = store();
        let schema = store.field_descriptors("ARTemplate").unwrap();
        let field = schema.field("Analyses").unwrap().clone();
        let t1 = store.create_object("ARTemplate", "/templates", "t1").unwrap();
        store.set_field(&t1, &field, analyses("u-old")).unwrap();

        let mut resolver = ReferenceResolver::default();
        resolver.defer_relink(relink(t1, field, "s1"));
        assert_eq!(resolver.pending_relinks().len(), 1);
        let s1 = store.create_object("AnalysisService", "/services", "s1").unwrap();

        let mut diagnostics = Diagnostics::new();
        let summary = resolver.finalize(&mut store, &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(summary.relinks_retried, 1);
        assert_eq!(summary.relinks_unresolved, 0);
        assert_eq!(
            store.object_at_path("/templates/t1").unwrap().field("Analyses"),
            &analyses(&s1.uid)
        );
        assert!(resolver.pending_relinks().is_empty());
    }

    #[test]
    fn test_finalize_reports_relink_miss_once() {
        let mut store = store();
        let schema = store.field_descriptors("ARTemplate").unwrap();
        let field = schema.field("Analyses").unwrap().clone();
        let t1 = store.create_object("ARTemplate", "/templates", "t1").unwrap();
        store.set_field(&t1, &field, analyses("u-old")).unwrap();

        let mut resolver = ReferenceResolver::default();
        resolver.defer_relink(relink(t1, field, "s9"));
        let mut diagnostics = Diagnostics::new();
        let summary = resolver.finalize(&mut store, &mut diagnostics).unwrap();

        assert_eq!(summary.relinks_unresolved, 1);
        assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedReference), 1);
        assert_eq!(
            store.object_at_path("/templates/t1").unwrap().field("Analyses"),
            &analyses("u-old")
        );
    }
}
