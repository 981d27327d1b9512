//! Pull command implementation.

use super::snapshot;
use super::CommandResult;
use dbal_sync_engine::SyncEngine;
use dbal_sync_protocol::Snapshot;

/// Runs the pull command.
///
/// Text output shows one count per collection; JSON output is the full
/// snapshot in the snapshot file format.
pub async fn run(engine: &SyncEngine, format: &str) -> CommandResult<Snapshot> {
    let pulled = engine.pull().await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot::to_json(&pulled))?),
        _ => print_text_output(&pulled),
    }
    Ok(pulled)
}

fn print_text_output(pulled: &Snapshot) {
    println!("Pulled from remote:");
    for (collection, records) in pulled {
        println!("  {:<14} {:>6}", collection.as_str(), records.len());
    }
    println!(
        "  {:<14} {:>6}",
        "total",
        pulled.values().map(Vec::len).sum::<usize>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbal_sync_engine::{
        Collection, EntityMapping, EntityRecord, MemoryRemote, MemoryStore, SyncConfig,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn pull_lists_every_collection() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert("t1", "core", "Lambda", EntityRecord::new().with("id", "l1"));
        let engine = SyncEngine::new(
            SyncConfig::new("http://dbal.test", "t1"),
            EntityMapping::default().shared(),
            remote,
            Arc::new(MemoryStore::new()),
        );

        let pulled = run(&engine, "text").await.unwrap();
        assert_eq!(pulled.len(), Collection::ALL.len());
        assert_eq!(pulled[&Collection::Lambdas].len(), 1);

        let pulled = run(&engine, "json").await.unwrap();
        assert_eq!(pulled[&Collection::Lambdas].len(), 1);
    }
}
