//! Entity records and snapshots.

use crate::collection::Collection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field carrying the record id.
pub const ID_FIELD: &str = "id";
/// Field carrying the owning tenant.
pub const TENANT_FIELD: &str = "tenantId";
/// Primary modification timestamp (epoch milliseconds).
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Fallback timestamp field used by older entity kinds.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Marker stamped onto records produced by a merge.
pub const MERGED_AT_FIELD: &str = "mergedAt";

/// The records of each collection at one point in time.
pub type Snapshot = BTreeMap<Collection, Vec<EntityRecord>>;

/// An opaque JSON entity record.
///
/// Only `id`, `tenantId` and the timestamp fields carry meaning for sync;
/// everything else is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord(Map<String, Value>);

impl EntityRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a record from a JSON value; non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns the record as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Consumes the record into its field map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Read access to the fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// The record id, if present and non-empty.
    ///
    /// Numeric ids are not accepted; the remote always issues string ids.
    pub fn id(&self) -> Option<&str> {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// The owning tenant, if present.
    pub fn tenant_id(&self) -> Option<&str> {
        self.0.get(TENANT_FIELD).and_then(Value::as_str)
    }

    /// `updatedAt`, falling back to `timestamp`, defaulting to 0.
    pub fn effective_timestamp(&self) -> i64 {
        self.0
            .get(UPDATED_AT_FIELD)
            .and_then(timestamp_value)
            .or_else(|| self.0.get(TIMESTAMP_FIELD).and_then(timestamp_value))
            .unwrap_or(0)
    }

    /// Returns a copy scoped to `id` and `tenant`, overriding whatever the record held.
    pub fn with_scope(&self, id: &str, tenant: &str) -> Self {
        let mut scoped = self.clone();
        scoped.insert(ID_FIELD, id);
        scoped.insert(TENANT_FIELD, tenant);
        scoped
    }

    /// Shallow merge: fields of `base` first, fields of `self` on top.
    pub fn merged_over(&self, base: &EntityRecord) -> Self {
        let mut merged = base.0.clone();
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        Self(merged)
    }

    /// Compact JSON with object keys sorted at every depth.
    pub fn canonical_json(&self) -> String {
        canonical_json(&Value::Object(self.0.clone()))
    }

    /// Canonical JSON without the timestamp fields `updatedAt`, `timestamp`
    /// and `mergedAt`.
    pub fn content_json(&self) -> String {
        let content: Map<String, Value> = self
            .0
            .iter()
            .filter(|(key, _)| !METADATA_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        canonical_json(&Value::Object(content))
    }

    /// True if both records carry the same content, timestamps aside.
    pub fn content_eq(&self, other: &EntityRecord) -> bool {
        self.content_json() == other.content_json()
    }
}

impl From<Map<String, Value>> for EntityRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

const METADATA_FIELDS: [&str; 3] = [UPDATED_AT_FIELD, TIMESTAMP_FIELD, MERGED_AT_FIELD];

fn timestamp_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Serializes a JSON value with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Returns a snapshot with an empty entry for every given collection.
pub fn empty_snapshot(collections: impl IntoIterator<Item = Collection>) -> Snapshot {
    collections.into_iter().map(|c| (c, Vec::new())).collect()
}
