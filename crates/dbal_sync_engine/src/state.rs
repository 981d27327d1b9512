//! Sync engine facade and sync status.

use crate::admin::AdminClient;
use crate::bulk::{BulkSync, PullReport, PushSummary};
use crate::client::EntitySyncClient;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::resolver::{now_ms, ConflictResolver, ResolveAllReport};
use crate::store::LocalStore;
use crate::throttle::{NoThrottle, Throttle};
use crate::transport::HttpTransport;
use dbal_sync_protocol::{
    detect_conflicts, Collection, ConflictId, ConflictItem, EntityMapping, EntityRecord,
    Resolution, ResolutionStrategy, Snapshot,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Status of the last bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing has run since start or the last reset.
    Idle,
    /// A bulk operation is in flight.
    Syncing,
    /// The last bulk operation completed cleanly.
    Success,
    /// The last bulk operation had failures.
    Error,
}

impl SyncStatus {
    /// Returns true while a bulk operation is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Bulk pushes run.
    pub pushes: u64,
    /// Bulk pulls run, detection passes included.
    pub pulls: u64,
    /// Records accepted by the remote across all pushes.
    pub records_pushed: u64,
    /// Records that failed across all pushes.
    pub records_failed: u64,
    /// Conflicts found across all detection passes.
    pub conflicts_detected: u64,
    /// Conflicts resolved.
    pub conflicts_resolved: u64,
    /// Completion time of the last bulk operation (epoch milliseconds).
    pub last_sync_at_ms: Option<i64>,
    /// Message of the last failed bulk operation.
    pub last_error: Option<String>,
}

/// Composes the client, bulk orchestration, detection and resolution over one local store.
pub struct SyncEngine {
    client: Arc<EntitySyncClient>,
    admin: AdminClient,
    bulk: BulkSync,
    resolver: ConflictResolver,
    store: Arc<dyn LocalStore>,
    status: RwLock<SyncStatus>,
    stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Creates a new sync engine.
    pub fn new(
        config: SyncConfig,
        mapping: Arc<EntityMapping>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self::with_throttle(config, mapping, transport, store, Arc::new(NoThrottle))
    }

    /// Creates an engine whose entity calls go through `throttle`.
    pub fn with_throttle(
        config: SyncConfig,
        mapping: Arc<EntityMapping>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn LocalStore>,
        throttle: Arc<dyn Throttle>,
    ) -> Self {
        let admin = AdminClient::new(config.clone(), transport.clone());
        let client = Arc::new(
            EntitySyncClient::new(config, mapping, transport).with_throttle(throttle),
        );
        Self {
            bulk: BulkSync::new(client.clone()),
            resolver: ConflictResolver::new(client.clone(), store.clone()),
            client,
            admin,
            store,
            status: RwLock::new(SyncStatus::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The single-record client, for direct calls.
    pub fn client(&self) -> &EntitySyncClient {
        &self.client
    }

    /// The admin plane client.
    pub fn admin(&self) -> &AdminClient {
        &self.admin
    }

    /// The conflict resolver holding the pending list.
    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Gets the current status.
    pub fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Returns the status to `Idle`.
    pub fn reset_status(&self) {
        self.set_status(SyncStatus::Idle);
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Pending conflicts from the last detection pass.
    pub fn pending_conflicts(&self) -> Vec<ConflictItem> {
        self.resolver.pending()
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status;
    }

    fn mapped_collections(&self) -> Vec<Collection> {
        self.client.mapping().collections().collect()
    }

    /// Pushes the local store's mapped collections.
    ///
    /// Ends in `Error` status if any record failed.
    pub async fn push(&self) -> PushSummary {
        let snapshot = self.store.snapshot(&self.mapped_collections());
        self.push_snapshot(&snapshot).await
    }

    /// Pushes an explicit snapshot.
    pub async fn push_snapshot(&self, snapshot: &Snapshot) -> PushSummary {
        self.set_status(SyncStatus::Syncing);
        let summary = self.bulk.push_all(snapshot).await;

        let mut stats = self.stats.write();
        stats.pushes += 1;
        stats.records_pushed += summary.synced as u64;
        stats.records_failed += summary.failed as u64;
        stats.last_sync_at_ms = Some(now_ms());
        if summary.is_clean() {
            stats.last_error = None;
            self.set_status(SyncStatus::Success);
        } else {
            stats.last_error = Some(format!(
                "{} of {} records failed to push",
                summary.failed,
                summary.synced + summary.failed
            ));
            self.set_status(SyncStatus::Error);
        }
        summary
    }

    /// Pulls every mapped collection from the remote.
    ///
    /// Ends in `Error` status if any collection could not be listed.
    pub async fn pull(&self) -> Snapshot {
        self.pull_report().await.snapshot
    }

    async fn pull_report(&self) -> PullReport {
        self.set_status(SyncStatus::Syncing);
        let report = self.bulk.pull_report().await;

        let mut stats = self.stats.write();
        stats.pulls += 1;
        stats.last_sync_at_ms = Some(now_ms());
        if report.is_clean() {
            stats.last_error = None;
            self.set_status(SyncStatus::Success);
        } else {
            stats.last_error = Some(format!(
                "{} of {} collections failed to pull",
                report.failed.len(),
                report.snapshot.len()
            ));
            self.set_status(SyncStatus::Error);
        }
        report
    }

    /// Pulls, then compares the result against the local store.
    ///
    /// The returned items replace the pending list; ids from earlier passes
    /// become stale. Pending items of collections the remote could not list
    /// are kept.
    pub async fn detect_conflicts(&self) -> Vec<ConflictItem> {
        let report = self.pull_report().await;
        let local = self.store.snapshot(&self.mapped_collections());
        self.detect_against(&local, &report)
    }

    /// Detects conflicts between an explicit local snapshot and a fresh pull.
    pub async fn detect_conflicts_for(&self, local: &Snapshot) -> Vec<ConflictItem> {
        let report = self.pull_report().await;
        self.detect_against(local, &report)
    }

    fn detect_against(&self, local: &Snapshot, remote: &PullReport) -> Vec<ConflictItem> {
        if remote.is_total_failure() {
            tracing::warn!("detection skipped, remote unavailable");
            return Vec::new();
        }

        let conflicts =
            detect_conflicts(self.client.mapping(), local, &remote.snapshot, now_ms());
        self.stats.write().conflicts_detected += conflicts.len() as u64;
        tracing::info!(
            conflicts = conflicts.len(),
            unavailable = remote.failed.len(),
            "detection complete"
        );

        let mut pending = conflicts.clone();
        pending.extend(
            self.resolver
                .pending()
                .into_iter()
                .filter(|item| remote.failed.contains(&item.collection())),
        );
        self.resolver.set_pending(pending);
        conflicts
    }

    /// Resolves one pending conflict.
    pub async fn resolve(
        &self,
        id: &ConflictId,
        strategy: ResolutionStrategy,
        custom: Option<EntityRecord>,
    ) -> SyncResult<Resolution> {
        let resolution = self.resolver.resolve_one(id, strategy, custom).await?;
        self.stats.write().conflicts_resolved += 1;
        Ok(resolution)
    }

    /// Resolves every pending conflict with one strategy.
    pub async fn resolve_all(&self, strategy: ResolutionStrategy) -> ResolveAllReport {
        let report = self.resolver.resolve_all(strategy).await;
        self.stats.write().conflicts_resolved += report.resolved.len() as u64;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn record(value: serde_json::Value) -> EntityRecord {
        EntityRecord::from_value(value).unwrap()
    }

    fn engine(remote: &Arc<MemoryRemote>, store: &Arc<MemoryStore>) -> SyncEngine {
        SyncEngine::new(
            SyncConfig::new("http://dbal.test", "t1"),
            EntityMapping::default().shared(),
            remote.clone(),
            store.clone(),
        )
    }

    #[test]
    fn status_names() {
        assert_eq!(SyncStatus::Idle.as_str(), "idle");
        assert!(SyncStatus::Syncing.is_active());
        assert!(!SyncStatus::Error.is_active());
    }

    #[tokio::test]
    async fn push_updates_status_and_stats() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        store.replace(Collection::Files, vec![record(json!({"id": "f1"}))]);
        let engine = engine(&remote, &store);
        assert_eq!(engine.status(), SyncStatus::Idle);

        let summary = engine.push().await;
        assert_eq!(summary.synced, 1);
        assert_eq!(engine.status(), SyncStatus::Success);

        remote.set_offline(true);
        let summary = engine.push().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(engine.status(), SyncStatus::Error);

        let stats = engine.stats();
        assert_eq!(stats.pushes, 2);
        assert_eq!(stats.records_pushed, 1);
        assert_eq!(stats.records_failed, 1);
        assert!(stats.last_error.is_some());

        engine.reset_status();
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn detection_replaces_pending() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        store.replace(Collection::Themes, vec![record(json!({"id": "dark", "bg": "#111"}))]);
        remote.insert("t1", "core", "Theme", record(json!({"id": "dark", "bg": "#000"})));
        let engine = engine(&remote, &store);

        let conflicts = engine.detect_conflicts().await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(engine.pending_conflicts().len(), 1);
        assert_eq!(engine.stats().pulls, 1);

        store.replace(Collection::Themes, vec![record(json!({"id": "dark", "bg": "#000"}))]);
        assert!(engine.detect_conflicts().await.is_empty());
        assert!(engine.pending_conflicts().is_empty());
        assert_eq!(engine.stats().conflicts_detected, 1);
    }

    #[tokio::test]
    async fn offline_detection_keeps_pending() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        store.replace(Collection::Themes, vec![record(json!({"id": "dark", "bg": "#111"}))]);
        remote.insert("t1", "core", "Theme", record(json!({"id": "dark", "bg": "#000"})));
        let engine = engine(&remote, &store);
        assert_eq!(engine.detect_conflicts().await.len(), 1);

        remote.set_offline(true);
        assert!(engine.detect_conflicts().await.is_empty());
        assert_eq!(engine.pending_conflicts().len(), 1);
        assert_eq!(engine.status(), SyncStatus::Error);
        assert!(engine.stats().last_error.is_some());

        remote.set_offline(false);
        assert_eq!(engine.detect_conflicts().await.len(), 1);
        assert_eq!(engine.status(), SyncStatus::Success);
    }

    #[tokio::test]
    async fn partial_outage_keeps_pending_of_failed_collections() {
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        store.replace(Collection::Themes, vec![record(json!({"id": "dark", "bg": "#111"}))]);
        store.replace(Collection::Files, vec![record(json!({"id": "f1", "content": "a"}))]);
        remote.insert("t1", "core", "Theme", record(json!({"id": "dark", "bg": "#000"})));
        remote.insert("t1", "core", "File", record(json!({"id": "f1", "content": "b"})));
        let engine = engine(&remote, &store);
        assert_eq!(engine.detect_conflicts().await.len(), 2);

        remote.fail_path("/t1/core/Theme", 503, "maintenance");
        store.replace(Collection::Files, vec![record(json!({"id": "f1", "content": "b"}))]);

        assert!(engine.detect_conflicts().await.is_empty());
        let pending = engine.pending_conflicts();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.to_string(), "themes:dark");
        assert_eq!(engine.status(), SyncStatus::Error);
    }
}
