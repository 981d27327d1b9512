//! Bulk push and pull of whole snapshots.

use crate::client::EntitySyncClient;
use crate::throttle::Priority;
use dbal_sync_protocol::{Collection, EntityRecord, Snapshot};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of a bulk push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    /// Records the remote accepted.
    pub synced: usize,
    /// Records that failed for any reason.
    pub failed: usize,
}

impl PushSummary {
    /// Returns true if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of a bulk pull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullReport {
    /// Every mapped collection, empty where the remote had nothing or could not answer.
    pub snapshot: Snapshot,
    /// Collections whose list failed, in mapping order.
    pub failed: Vec<Collection>,
}

impl PullReport {
    /// Returns true if every list succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true if no collection could be listed.
    pub fn is_total_failure(&self) -> bool {
        !self.failed.is_empty() && self.failed.len() == self.snapshot.len()
    }
}

/// Moves whole snapshots between the local store and the remote service.
pub struct BulkSync {
    client: Arc<EntitySyncClient>,
}

impl BulkSync {
    /// Creates an orchestrator over `client`.
    pub fn new(client: Arc<EntitySyncClient>) -> Self {
        Self { client }
    }

    /// Upserts every record with an id of every mapped collection in `snapshot`.
    ///
    /// Records are pushed concurrently, up to the configured limit, in no
    /// particular order. A failed record is counted and never aborts the
    /// batch. Records without an id are skipped and not counted.
    pub async fn push_all(&self, snapshot: &Snapshot) -> PushSummary {
        let started = Instant::now();
        let mapping = self.client.mapping();
        let concurrency = self.client.config().push_concurrency.max(1);

        let jobs: Vec<(Collection, &str, &EntityRecord)> = snapshot
            .iter()
            .filter(|(collection, _)| mapping.contains(**collection))
            .flat_map(|(collection, records)| {
                records
                    .iter()
                    .filter_map(move |r| r.id().map(|id| (*collection, id, r)))
            })
            .collect();
        let collections = snapshot
            .keys()
            .filter(|c| mapping.contains(**c))
            .count();

        let outcomes: Vec<bool> = stream::iter(jobs)
            .map(|(collection, id, record)| async move {
                match self
                    .client
                    .put_record(collection, id, record, Priority::Low)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(%collection, id, error = %e, "record push failed");
                        false
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let synced = outcomes.iter().filter(|ok| **ok).count();
        let summary = PushSummary {
            synced,
            failed: outcomes.len() - synced,
        };
        info!(
            collections,
            synced = summary.synced,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "push complete"
        );
        summary
    }

    /// Lists every mapped collection concurrently.
    ///
    /// Waits for all lists to settle. The result holds every mapped
    /// collection, empty where the remote had nothing or could not answer.
    pub async fn pull_all(&self) -> Snapshot {
        self.pull_report().await.snapshot
    }

    /// Same as [`pull_all`](Self::pull_all), also naming the collections
    /// whose list failed.
    pub async fn pull_report(&self) -> PullReport {
        let started = Instant::now();
        let collections: Vec<Collection> = self.client.mapping().collections().collect();

        let lists = join_all(collections.iter().map(|c| self.client.try_list(*c, &[]))).await;

        let mut report = PullReport::default();
        for (collection, outcome) in collections.into_iter().zip(lists) {
            let records = match outcome {
                Ok(records) => records,
                Err(e) => {
                    warn!(%collection, error = %e, "collection pull failed");
                    report.failed.push(collection);
                    Vec::new()
                }
            };
            report.snapshot.insert(collection, records);
        }

        info!(
            collections = report.snapshot.len(),
            failed = report.failed.len(),
            records = report.snapshot.values().map(Vec::len).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pull complete"
        );
        report
    }
}
