//! Local store seam.

use dbal_sync_protocol::{Collection, EntityRecord, Snapshot};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The application's local copy of each collection.
///
/// The sync layer reads whole collections and writes them back; it never
/// creates or drops a collection.
pub trait LocalStore: Send + Sync {
    /// Current records of a collection; empty if it holds nothing.
    fn records(&self, collection: Collection) -> Vec<EntityRecord>;

    /// Replaces the contents of a collection.
    fn replace(&self, collection: Collection, records: Vec<EntityRecord>);

    /// Takes a snapshot of the given collections.
    fn snapshot(&self, collections: &[Collection]) -> Snapshot {
        collections
            .iter()
            .map(|c| (*c, self.records(*c)))
            .collect()
    }

    /// Replaces the record with the same id, or appends it.
    fn upsert_record(&self, collection: Collection, record: EntityRecord) {
        let mut records = self.records(collection);
        let existing = record
            .id()
            .and_then(|id| records.iter().position(|r| r.id() == Some(id)));
        match existing {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        self.replace(collection, records);
    }
}

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<Collection, Vec<EntityRecord>>>,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            collections: RwLock::new(snapshot),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of `replace` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Looks up one record by id.
    pub fn get(&self, collection: Collection, id: &str) -> Option<EntityRecord> {
        self.collections
            .read()
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id() == Some(id)).cloned())
    }
}

impl LocalStore for MemoryStore {
    fn records(&self, collection: Collection) -> Vec<EntityRecord> {
        self.collections
            .read()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn replace(&self, collection: Collection, records: Vec<EntityRecord>) {
        self.collections.write().insert(collection, records);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
