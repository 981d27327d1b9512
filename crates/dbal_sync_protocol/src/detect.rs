//! Conflict detection between a local and a remote snapshot.
//!
//! Detection is driven from the remote side:
//! 1. Walk every remote record of every mapped collection
//! 2. Find the local record with the same id
//! 3. Compare canonical JSON without timestamp fields; a difference yields
//!    one [`ConflictItem`]
//!
//! Records present on only one side are not conflicts. Creation and deletion
//! travel through the bulk push/pull paths instead.

use crate::collection::EntityMapping;
use crate::conflict::{ConflictId, ConflictItem};
use crate::record::{EntityRecord, Snapshot};
use std::collections::{HashMap, HashSet};

/// Compares `local` against `remote` and returns every diverged entity.
///
/// Timestamps are informational only: `updatedAt`, `timestamp` and
/// `mergedAt` are left out of the comparison, so a timestamp-only touch never
/// conflicts and differing content always does.
/// Output order is mapping order, then remote list order. A remote id that
/// appears twice in one collection is reported at most once.
pub fn detect_conflicts(
    mapping: &EntityMapping,
    local: &Snapshot,
    remote: &Snapshot,
    detected_at: i64,
) -> Vec<ConflictItem> {
    let mut conflicts = Vec::new();

    for collection in mapping.collections() {
        let Some(remote_records) = remote.get(&collection) else {
            continue;
        };
        let Some(local_records) = local.get(&collection) else {
            continue;
        };
        let Ok(target) = mapping.target(collection) else {
            continue;
        };

        let local_by_id: HashMap<&str, &EntityRecord> = local_records
            .iter()
            .filter_map(|r| r.id().map(|id| (id, r)))
            .collect();
        let mut seen = HashSet::new();

        for remote_record in remote_records {
            let Some(id) = remote_record.id() else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            let Some(local_record) = local_by_id.get(id) else {
                continue;
            };
            if local_record.content_eq(remote_record) {
                continue;
            }
            conflicts.push(ConflictItem::new(
                ConflictId::new(collection, id),
                target.entity_type.clone(),
                (*local_record).clone(),
                remote_record.clone(),
                detected_at,
            ));
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Collection, SyncTarget};
    use crate::record::empty_snapshot;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> EntityRecord {
        EntityRecord::from_value(value).unwrap()
    }

    fn snapshot(collection: Collection, records: Vec<EntityRecord>) -> Snapshot {
        let mut snap = empty_snapshot(Collection::ALL);
        snap.insert(collection, records);
        snap
    }

    #[test]
    fn diverged_content_is_a_conflict() {
        let mapping = EntityMapping::default();
        let local = snapshot(
            Collection::Files,
            vec![record(json!({"id": "f1", "tenantId": "t1", "content": "a", "updatedAt": 100}))],
        );
        let remote = snapshot(
            Collection::Files,
            vec![record(json!({"id": "f1", "tenantId": "t1", "content": "b", "updatedAt": 200}))],
        );

        let conflicts = detect_conflicts(&mapping, &local, &remote, 5_000);
        assert_eq!(conflicts.len(), 1);
        let item = &conflicts[0];
        assert_eq!(item.id.to_string(), "files:f1");
        assert_eq!(item.entity_type, "File");
        assert_eq!(item.local_timestamp, 100);
        assert_eq!(item.remote_timestamp, 200);
        assert_eq!(item.detected_at, 5_000);
    }

    #[test]
    fn identical_content_in_other_key_order_is_not_a_conflict() {
        let mapping = EntityMapping::default();
        let local = snapshot(
            Collection::Themes,
            vec![record(json!({"id": "t", "name": "dark", "updatedAt": 100}))],
        );
        let remote = snapshot(
            Collection::Themes,
            vec![record(json!({"updatedAt": 100, "name": "dark", "id": "t"}))],
        );
        assert!(detect_conflicts(&mapping, &local, &remote, 0).is_empty());
    }

    #[test]
    fn timestamp_only_touch_is_not_a_conflict() {
        let mapping = EntityMapping::default();
        let local = snapshot(
            Collection::Settings,
            vec![record(json!({"id": "s1", "theme": "dark", "updatedAt": 100}))],
        );
        let remote = snapshot(
            Collection::Settings,
            vec![record(json!({"id": "s1", "theme": "dark", "updatedAt": 900, "mergedAt": 900}))],
        );
        assert!(detect_conflicts(&mapping, &local, &remote, 0).is_empty());

        let edited = snapshot(
            Collection::Settings,
            vec![record(json!({"id": "s1", "theme": "light", "updatedAt": 100}))],
        );
        assert_eq!(detect_conflicts(&mapping, &local, &edited, 0).len(), 1);
    }

    #[test]
    fn one_sided_records_are_ignored() {
        let mapping = EntityMapping::default();
        let local = snapshot(Collection::Models, vec![record(json!({"id": "only-local"}))]);
        let remote = snapshot(
            Collection::Models,
            vec![record(json!({"id": "only-remote"})), record(json!({"name": "no id"}))],
        );
        assert!(detect_conflicts(&mapping, &local, &remote, 0).is_empty());
    }

    #[test]
    fn duplicate_remote_ids_report_once() {
        let mapping = EntityMapping::default();
        let local = snapshot(Collection::Lambdas, vec![record(json!({"id": "l", "v": 1}))]);
        let remote = snapshot(
            Collection::Lambdas,
            vec![record(json!({"id": "l", "v": 2})), record(json!({"id": "l", "v": 3}))],
        );
        let conflicts = detect_conflicts(&mapping, &local, &remote, 0);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].remote.get("v"), Some(&json!(2)));
    }

    #[test]
    fn unmapped_collections_are_skipped() {
        let mapping = EntityMapping::builder()
            .with_target(Collection::Files, SyncTarget::new("core", "File"))
            .build();
        let local = snapshot(Collection::Models, vec![record(json!({"id": "m", "v": 1}))]);
        let remote = snapshot(Collection::Models, vec![record(json!({"id": "m", "v": 2}))]);
        assert!(detect_conflicts(&mapping, &local, &remote, 0).is_empty());
    }

    fn field_map() -> impl Strategy<Value = serde_json::Map<String, Value>> {
        prop::collection::btree_map("[a-e]", any::<i32>(), 0..5).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn identical_content_never_conflicts(fields in field_map()) {
            let mapping = EntityMapping::default();
            let local = EntityRecord::from(fields).with("id", "x");
            let remote = local.clone();
            let conflicts = detect_conflicts(
                &mapping,
                &snapshot(Collection::Files, vec![local]),
                &snapshot(Collection::Files, vec![remote]),
                0,
            );
            prop_assert!(conflicts.is_empty());
        }

        #[test]
        fn differing_content_conflicts_exactly_once(
            local_fields in field_map(),
            remote_fields in field_map(),
        ) {
            let mapping = EntityMapping::default();
            let local = EntityRecord::from(local_fields).with("id", "x");
            let remote = EntityRecord::from(remote_fields).with("id", "x");
            let differs = !local.content_eq(&remote);
            let conflicts = detect_conflicts(
                &mapping,
                &snapshot(Collection::Settings, vec![local]),
                &snapshot(Collection::Settings, vec![remote]),
                0,
            );
            prop_assert_eq!(conflicts.len(), usize::from(differs));
        }
    }
}
