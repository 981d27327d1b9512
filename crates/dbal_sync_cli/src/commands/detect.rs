//! Detect command implementation.

use super::snapshot;
use super::CommandResult;
use dbal_sync_engine::SyncEngine;
use dbal_sync_protocol::ConflictItem;
use serde::Serialize;
use std::path::Path;

/// One conflict as reported by the CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRow {
    /// Composite id.
    pub id: String,
    /// Remote entity type.
    pub entity_type: String,
    /// Local effective timestamp.
    pub local_timestamp: i64,
    /// Remote effective timestamp.
    pub remote_timestamp: i64,
    /// Which side changed last.
    pub newer: &'static str,
}

impl From<&ConflictItem> for ConflictRow {
    fn from(item: &ConflictItem) -> Self {
        Self {
            id: item.id.to_string(),
            entity_type: item.entity_type.clone(),
            local_timestamp: item.local_timestamp,
            remote_timestamp: item.remote_timestamp,
            newer: if item.remote_is_newer() {
                "remote"
            } else {
                "local"
            },
        }
    }
}

/// Runs the detect command against a local snapshot file.
pub async fn run(engine: &SyncEngine, path: &Path, format: &str) -> CommandResult<Vec<ConflictRow>> {
    let local = snapshot::load(path)?;
    let rows: Vec<ConflictRow> = engine
        .detect_conflicts_for(&local)
        .await
        .iter()
        .map(ConflictRow::from)
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("✓ No conflicts");
            } else {
                println!("{} conflicts:", rows.len());
                for row in &rows {
                    println!(
                        "  {:<32} local@{} remote@{} ({} newer)",
                        row.id, row.local_timestamp, row.remote_timestamp, row.newer
                    );
                }
            }
        }
    }
    Ok(rows)
}
