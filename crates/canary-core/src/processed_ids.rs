use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::atomic_io::write_text_atomic;

/// Key-value set of ticket ids the polling loop has already handled.
pub trait ProcessedIdStore {
    fn load(&self) -> Result<HashSet<String>>;
    fn save(&self, ids: &HashSet<String>) -> Result<()>;
}

#[derive(Debug, Clone)]
/// Stores processed ids as a JSON array of strings in a single file.
pub struct JsonFileProcessedIdStore {
    path: PathBuf,
}

impl JsonFileProcessedIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProcessedIdStore for JsonFileProcessedIdStore {
    fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "processed id file missing; starting empty");
            return Ok(HashSet::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(HashSet::new());
        }
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        let Value::Array(items) = parsed else {
            return Err(anyhow!(
                "processed id file '{}' must contain a JSON array",
                self.path.display()
            ));
        };
        // Ids may have been written as numbers by older tooling.
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .collect())
    }

    fn save(&self, ids: &HashSet<String>) -> Result<()> {
        let ordered = ids.iter().collect::<BTreeSet<_>>();
        let payload = serde_json::to_string(&ordered)?;
        write_text_atomic(&self.path, &payload)
    }
}

#[derive(Debug, Default)]
/// In-process store used by tests and dry runs.
pub struct MemoryProcessedIdStore {
    ids: Mutex<HashSet<String>>,
}

impl MemoryProcessedIdStore {
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl ProcessedIdStore for MemoryProcessedIdStore {
    fn load(&self) -> Result<HashSet<String>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| anyhow!("processed id store lock poisoned"))?;
        Ok(ids.clone())
    }

    fn save(&self, ids: &HashSet<String>) -> Result<()> {
        let mut stored = self
            .ids
            .lock()
            .map_err(|_| anyhow!("processed id store lock poisoned"))?;
        *stored = ids.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{JsonFileProcessedIdStore, MemoryProcessedIdStore, ProcessedIdStore};

    #[test]
    fn unit_json_file_store_treats_missing_file_as_empty() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileProcessedIdStore::new(tempdir.path().join("missing.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn functional_json_file_store_persists_sorted_ids() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("processed_ids.json");
        let store = JsonFileProcessedIdStore::new(&path);
        let ids = HashSet::from(["3012".to_string(), "2207".to_string()]);
        store.save(&ids).expect("save");

        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            r#"["2207","3012"]"#
        );
        assert_eq!(store.load().expect("load"), ids);
    }

    #[test]
    fn regression_json_file_store_accepts_numeric_ids() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("processed_ids.json");
        std::fs::write(&path, r#"[3012, "2321", null]"#).expect("seed");
        let store = JsonFileProcessedIdStore::new(&path);
        let loaded = store.load().expect("load");
        assert_eq!(
            loaded,
            HashSet::from(["3012".to_string(), "2321".to_string()])
        );
    }

    #[test]
    fn regression_json_file_store_rejects_non_array_payload() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("processed_ids.json");
        std::fs::write(&path, r#"{"ids": []}"#).expect("seed");
        let error = JsonFileProcessedIdStore::new(&path)
            .load()
            .expect_err("object payload should fail");
        assert!(error.to_string().contains("must contain a JSON array"));
    }

    #[test]
    fn unit_memory_store_replaces_previous_set() {
        let store = MemoryProcessedIdStore::with_ids(["1", "2"]);
        store
            .save(&HashSet::from(["3".to_string()]))
            .expect("save");
        assert_eq!(
            store.load().expect("load"),
            HashSet::from(["3".to_string()])
        );
    }
}
