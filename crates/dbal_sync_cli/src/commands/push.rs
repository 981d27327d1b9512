//! Push command implementation.

use super::snapshot;
use super::CommandResult;
use dbal_sync_engine::{PushSummary, SyncEngine};
use std::path::Path;

/// Runs the push command. Any failed record makes the command fail.
pub async fn run(engine: &SyncEngine, path: &Path) -> CommandResult<PushSummary> {
    let local = snapshot::load(path)?;
    let records: usize = local.values().map(Vec::len).sum();
    println!("Pushing {} records from {}", records, path.display());

    let summary = engine.push_snapshot(&local).await;
    println!("  Synced: {}", summary.synced);
    println!("  Failed: {}", summary.failed);

    if summary.is_clean() {
        println!("✓ Push complete");
        Ok(summary)
    } else {
        Err(format!("{} records failed to push", summary.failed).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbal_sync_engine::{EntityMapping, MemoryRemote, MemoryStore, SyncConfig};
    use std::io::Write;
    use std::sync::Arc;

    fn engine(remote: &Arc<MemoryRemote>) -> SyncEngine {
        SyncEngine::new(
            SyncConfig::new("http://dbal.test", "t1"),
            EntityMapping::default().shared(),
            remote.clone(),
            Arc::new(MemoryStore::new()),
        )
    }

    fn snapshot_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn push_snapshot_file() {
        let remote = Arc::new(MemoryRemote::new());
        let file = snapshot_file(r#"{"files": [{"id": "f1"}, {"id": "f2"}]}"#);

        let summary = run(&engine(&remote), file.path()).await.unwrap();
        assert_eq!(summary.synced, 2);
        assert_eq!(remote.entities("t1", "core", "File").len(), 2);
    }

    #[tokio::test]
    async fn failed_records_fail_the_command() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_offline(true);
        let file = snapshot_file(r#"{"models": [{"id": "m1"}]}"#);

        let err = run(&engine(&remote), file.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "1 records failed to push");
    }
}
