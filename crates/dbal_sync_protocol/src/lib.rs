//! # DBAL Sync Protocol
//!
//! Data types shared by the DBAL entity sync client.
//!
//! This crate provides:
//! - `Collection` and the `EntityMapping` table onto remote entity routes
//! - `EntityRecord` and `Snapshot`
//! - `ConflictItem`, `ResolutionStrategy` and the merge policy
//! - Conflict detection between two snapshots
//! - Wire and admin message types
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod conflict;
mod detect;
mod error;
mod messages;
mod record;

pub use collection::{Collection, EntityMapping, EntityMappingBuilder, SyncTarget};
pub use conflict::{
    merge_records, ConflictId, ConflictItem, ConflictState, Resolution, ResolutionStrategy,
};
pub use detect::detect_conflicts;
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    error_message, extract_records, redact_database_url, unwrap_data, AdapterConfig,
    AdapterInfo, AdapterRequest, ConnectionTest, HealthStatus, SeedEntityResult, SeedRequest,
    SeedSummary,
};
pub use record::{
    canonical_json, empty_snapshot, EntityRecord, Snapshot, ID_FIELD, MERGED_AT_FIELD,
    TENANT_FIELD, TIMESTAMP_FIELD, UPDATED_AT_FIELD,
};
