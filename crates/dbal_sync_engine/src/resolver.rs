//! Conflict resolution.
//!
//! Each pending item moves `Detected → Resolving`, then either leaves the
//! pending list (resolved) or stays in it as `Failed` for a later retry.

use crate::client::EntitySyncClient;
use crate::error::{SyncError, SyncResult};
use crate::store::LocalStore;
use crate::throttle::Priority;
use dbal_sync_protocol::{
    merge_records, ConflictId, ConflictItem, ConflictState, EntityRecord, Resolution,
    ResolutionStrategy, ID_FIELD,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Outcome of [`ConflictResolver::resolve_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveAllReport {
    /// Items resolved, in list order.
    pub resolved: Vec<Resolution>,
    /// Items that failed and remain pending.
    pub failed: Vec<(ConflictId, SyncError)>,
}

/// Owns the pending conflict list and applies resolutions to it.
pub struct ConflictResolver {
    client: Arc<EntitySyncClient>,
    store: Arc<dyn LocalStore>,
    pending: RwLock<Vec<ConflictItem>>,
}

impl ConflictResolver {
    /// Creates a resolver with an empty pending list.
    pub fn new(client: Arc<EntitySyncClient>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            client,
            store,
            pending: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the pending list with the outcome of a detection pass.
    pub fn set_pending(&self, items: Vec<ConflictItem>) {
        *self.pending.write() = items;
    }

    /// A copy of the pending list.
    pub fn pending(&self) -> Vec<ConflictItem> {
        self.pending.read().clone()
    }

    /// Number of pending items.
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Resolves one pending conflict.
    ///
    /// `custom` is required for [`ResolutionStrategy::Manual`] and ignored
    /// otherwise. The winner is written to the local store first; manual and
    /// merged records are then echoed to the remote. An echo that fails is
    /// logged and left to the next push.
    pub async fn resolve_one(
        &self,
        id: &ConflictId,
        strategy: ResolutionStrategy,
        custom: Option<EntityRecord>,
    ) -> SyncResult<Resolution> {
        let item = self.begin(id)?;

        match self.apply(&item, strategy, custom).await {
            Ok(resolution) => {
                self.pending.write().retain(|i| &i.id != id);
                info!(conflict = %id, %strategy, "conflict resolved");
                Ok(resolution)
            }
            Err(e) => {
                self.mark(id, ConflictState::Failed);
                warn!(conflict = %id, %strategy, error = %e, "conflict resolution failed");
                Err(e)
            }
        }
    }

    /// Resolves every pending item with one strategy, one at a time in list order.
    ///
    /// Failures do not stop the pass; afterwards only the failed items remain
    /// pending.
    pub async fn resolve_all(&self, strategy: ResolutionStrategy) -> ResolveAllReport {
        let ids: Vec<ConflictId> = self
            .pending
            .read()
            .iter()
            .filter(|i| i.state.can_resolve())
            .map(|i| i.id.clone())
            .collect();

        let mut report = ResolveAllReport::default();
        for id in ids {
            match self.resolve_one(&id, strategy, None).await {
                Ok(resolution) => report.resolved.push(resolution),
                Err(e) => report.failed.push((id, e)),
            }
        }
        info!(
            resolved = report.resolved.len(),
            failed = report.failed.len(),
            %strategy,
            "batch resolution complete"
        );
        report
    }

    fn begin(&self, id: &ConflictId) -> SyncResult<ConflictItem> {
        let mut pending = self.pending.write();
        let item = pending
            .iter_mut()
            .find(|i| &i.id == id && i.state.can_resolve())
            .ok_or_else(|| SyncError::ConflictNotFound(id.to_string()))?;
        item.state = ConflictState::Resolving;
        Ok(item.clone())
    }

    fn mark(&self, id: &ConflictId, state: ConflictState) {
        if let Some(item) = self.pending.write().iter_mut().find(|i| &i.id == id) {
            item.state = state;
        }
    }

    async fn apply(
        &self,
        item: &ConflictItem,
        strategy: ResolutionStrategy,
        custom: Option<EntityRecord>,
    ) -> SyncResult<Resolution> {
        let now = now_ms();
        let entity_id = item.id.entity_id.as_str();
        let record = match strategy {
            ResolutionStrategy::Local => item.local.clone(),
            ResolutionStrategy::Remote => item.remote.clone(),
            ResolutionStrategy::Manual => custom
                .ok_or_else(|| SyncError::MissingCustomVersion(item.id.to_string()))?
                .with(ID_FIELD, entity_id),
            ResolutionStrategy::Merge => merge_records(&item.local, &item.remote, now),
        };

        // Local already holds its own version.
        if strategy != ResolutionStrategy::Local {
            self.store.upsert_record(item.collection(), record.clone());
        }

        if strategy.echoes_to_remote() {
            if let Err(e) = self
                .client
                .put_record(item.collection(), entity_id, &record, Priority::High)
                .await
            {
                warn!(conflict = %item.id, error = %e, "resolution kept locally, remote echo deferred");
            }
        }

        Ok(Resolution {
            conflict_id: item.id.clone(),
            strategy,
            record,
            resolved_at: now,
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
