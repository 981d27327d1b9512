//! # DBAL Sync Engine
//!
//! Offline-first synchronization between a local entity store and the
//! remote DBAL REST service.
//!
//! This crate provides:
//! - Single-record entity calls (upsert, create, fetch, list, remove)
//! - Bulk push and pull of whole snapshots
//! - Conflict detection and resolution (local, remote, manual, merge)
//! - Admin plane calls (health, adapter config, seeding)
//! - HTTP transport abstraction with an in-memory remote for tests
//!
//! ## Architecture
//!
//! Every remote call goes through an [`HttpTransport`] and is bounded by the
//! configured request timeout. Entity paths are `/{tenant}/{package}/{entity}`,
//! resolved through an [`EntityMapping`].
//!
//! ```rust,ignore
//! use dbal_sync_engine::{SyncConfig, SyncEngine, ReqwestTransport, MemoryStore};
//! use dbal_sync_engine::EntityMapping;
//! use std::sync::Arc;
//!
//! let config = SyncConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::new(&config)?);
//! let engine = SyncEngine::new(config, EntityMapping::default().shared(), transport, Arc::new(MemoryStore::new()));
//!
//! let conflicts = engine.detect_conflicts().await;
//! ```
//!
//! ## Offline behavior
//!
//! - Direct calls report an unreachable service as `RemoteUnavailable`
//! - `fetch` and `list` degrade to "nothing" instead of failing
//! - Bulk operations never abort; failures are counted

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod admin;
mod bulk;
mod client;
mod config;
mod error;
mod http;
mod memory;
mod resolver;
mod state;
mod store;
mod throttle;
mod transport;

pub use admin::AdminClient;
pub use bulk::{BulkSync, PullReport, PushSummary};
pub use client::EntitySyncClient;
pub use config::{SyncConfig, DEFAULT_BASE_URL, DEFAULT_TENANT};
pub use error::{SyncError, SyncResult};
pub use http::ReqwestTransport;
pub use memory::MemoryRemote;
pub use resolver::{ConflictResolver, ResolveAllReport};
pub use state::{SyncEngine, SyncStats, SyncStatus};
pub use store::{LocalStore, MemoryStore};
pub use throttle::{NoThrottle, Priority, Throttle, TokenBucketThrottle};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

pub use dbal_sync_protocol::{
    Collection, ConflictId, ConflictItem, ConflictState, EntityMapping, EntityRecord,
    Resolution, ResolutionStrategy, Snapshot, SyncTarget,
};
