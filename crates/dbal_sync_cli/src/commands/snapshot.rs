//! Snapshot files.
//!
//! A snapshot file is a JSON object keyed by collection name, each value an
//! array of entity records:
//!
//! ```json
//! { "files": [{ "id": "f1", "content": "a" }], "themes": [] }
//! ```

use super::CommandResult;
use dbal_sync_protocol::{Collection, EntityRecord, Snapshot};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Reads a snapshot file.
pub fn load(path: &Path) -> CommandResult<Snapshot> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read snapshot {}: {e}", path.display()))?;
    parse(&raw)
}

/// Parses snapshot JSON. Unknown collection names are an error.
pub fn parse(raw: &str) -> CommandResult<Snapshot> {
    let object: Map<String, Value> = serde_json::from_str(raw)?;
    let mut snapshot = Snapshot::new();
    for (name, records) in object {
        let collection: Collection = name.parse()?;
        let records: Vec<EntityRecord> = serde_json::from_value(records)
            .map_err(|e| format!("collection {collection}: {e}"))?;
        snapshot.insert(collection, records);
    }
    Ok(snapshot)
}

/// Renders a snapshot in the file format.
pub fn to_json(snapshot: &Snapshot) -> Value {
    Value::Object(
        snapshot
            .iter()
            .map(|(collection, records)| {
                let records = records.iter().map(EntityRecord::to_value).collect();
                (collection.as_str().to_string(), Value::Array(records))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_keyed_by_collection() {
        let snapshot = parse(r#"{"files": [{"id": "f1"}], "themes": []}"#).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&Collection::Files][0].id(), Some("f1"));
        assert!(snapshot[&Collection::Themes].is_empty());
    }

    #[test]
    fn parse_rejects_unknown_collection() {
        let err = parse(r#"{"widgets": []}"#).unwrap_err();
        assert!(err.to_string().contains("widgets"));
    }

    #[test]
    fn parse_rejects_non_object_records() {
        assert!(parse(r#"{"files": [1, 2]}"#).is_err());
        assert!(parse("[]").is_err());
    }

    #[test]
    fn load_from_file_and_render_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"settings": [{{"id": "s1", "v": 1}}]}}"#).unwrap();

        let snapshot = load(file.path()).unwrap();
        let rendered = to_json(&snapshot);
        assert_eq!(rendered["settings"][0]["v"], serde_json::json!(1));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read snapshot"));
    }
}
