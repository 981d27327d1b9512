//! Conflict items and resolution strategies.

use crate::collection::Collection;
use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{EntityRecord, MERGED_AT_FIELD, UPDATED_AT_FIELD};
use std::fmt;
use std::str::FromStr;

/// Composite conflict identifier, `collection:entityId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConflictId {
    /// Owning collection.
    pub collection: Collection,
    /// Entity id within the collection.
    pub entity_id: String,
}

impl ConflictId {
    /// Creates a new conflict id.
    pub fn new(collection: Collection, entity_id: impl Into<String>) -> Self {
        Self {
            collection,
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.entity_id)
    }
}

impl FromStr for ConflictId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Entity ids may themselves contain ':'; split on the first only.
        let (collection, entity_id) = s
            .split_once(':')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| ProtocolError::InvalidConflictId(s.to_string()))?;
        Ok(Self::new(collection.parse()?, entity_id))
    }
}

/// Lifecycle of a conflict item.
///
/// `Detected → Resolving → Resolved` or `Detected → Resolving → Failed`.
/// Failed items stay pending and may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictState {
    /// Produced by a detection pass.
    Detected,
    /// A resolution is in progress.
    Resolving,
    /// Resolved and applied.
    Resolved,
    /// The last resolution attempt failed.
    Failed,
}

impl ConflictState {
    /// Returns true if a resolution may be (re)attempted.
    pub fn can_resolve(&self) -> bool {
        matches!(self, ConflictState::Detected | ConflictState::Failed)
    }
}

/// One entity whose local and remote versions disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictItem {
    /// Composite id.
    pub id: ConflictId,
    /// Remote entity type name.
    pub entity_type: String,
    /// Full local version.
    pub local: EntityRecord,
    /// Full remote version.
    pub remote: EntityRecord,
    /// Effective timestamp of the local version.
    pub local_timestamp: i64,
    /// Effective timestamp of the remote version.
    pub remote_timestamp: i64,
    /// When the detection pass ran (epoch milliseconds).
    pub detected_at: i64,
    /// Current lifecycle state.
    pub state: ConflictState,
}

impl ConflictItem {
    /// Creates a freshly detected conflict.
    pub fn new(
        id: ConflictId,
        entity_type: impl Into<String>,
        local: EntityRecord,
        remote: EntityRecord,
        detected_at: i64,
    ) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            local_timestamp: local.effective_timestamp(),
            remote_timestamp: remote.effective_timestamp(),
            local,
            remote,
            detected_at,
            state: ConflictState::Detected,
        }
    }

    /// Owning collection.
    pub fn collection(&self) -> Collection {
        self.id.collection
    }

    /// Returns true if the remote version carries the later timestamp.
    pub fn remote_is_newer(&self) -> bool {
        self.remote_timestamp > self.local_timestamp
    }
}

/// Policy used to produce the record that supersedes both versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Keep the local version; the next push overwrites the remote.
    Local,
    /// Take the remote version into the local store.
    Remote,
    /// Use a caller-supplied record.
    Manual,
    /// Shallow merge, local fields winning on overlap.
    Merge,
}

impl ResolutionStrategy {
    /// Returns the strategy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::Local => "local",
            ResolutionStrategy::Remote => "remote",
            ResolutionStrategy::Manual => "manual",
            ResolutionStrategy::Merge => "merge",
        }
    }

    /// Returns true if the outcome must be written back to the remote service.
    pub fn echoes_to_remote(&self) -> bool {
        matches!(self, ResolutionStrategy::Manual | ResolutionStrategy::Merge)
    }
}

impl FromStr for ResolutionStrategy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "local" => Ok(ResolutionStrategy::Local),
            "remote" => Ok(ResolutionStrategy::Remote),
            "manual" => Ok(ResolutionStrategy::Manual),
            "merge" => Ok(ResolutionStrategy::Merge),
            other => Err(ProtocolError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The resolved conflict.
    pub conflict_id: ConflictId,
    /// Strategy that produced the record.
    pub strategy: ResolutionStrategy,
    /// The winning or merged record.
    pub record: EntityRecord,
    /// When the resolution was computed (epoch milliseconds).
    pub resolved_at: i64,
}

/// Merges two conflicting versions: remote as the base, local on top.
///
/// This is last-write-wins per field. Concurrent edits of the same field
/// silently keep the local value.
pub fn merge_records(local: &EntityRecord, remote: &EntityRecord, now_ms: i64) -> EntityRecord {
    local
        .merged_over(remote)
        .with(UPDATED_AT_FIELD, now_ms)
        .with(MERGED_AT_FIELD, now_ms)
}
