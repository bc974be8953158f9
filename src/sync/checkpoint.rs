use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Progress marker persisted between runs.
///
/// Informational only: deduplication relies on the ids already in the sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    #[serde(default)]
    pub last_processed_id: Option<String>,
}

/// JSON file holding the checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint; a missing file yields the default checkpoint
    pub fn load(&self) -> Result<SyncCheckpoint> {
        if !self.path.exists() {
            debug!("No checkpoint at {}, starting fresh", self.path.display());
            return Ok(SyncCheckpoint::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Unable to read checkpoint {}", self.path.display()))?;

        let checkpoint: SyncCheckpoint = serde_json::from_str(&content)
            .with_context(|| format!("Invalid checkpoint file {}", self.path.display()))?;

        debug!("Loaded checkpoint: {:?}", checkpoint);
        Ok(checkpoint)
    }

    /// Overwrite the checkpoint atomically (temp file + rename)
    pub fn save(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&dir)
            .with_context(|| format!("Unable to create checkpoint directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(checkpoint)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .context("Unable to create temporary checkpoint file")?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Unable to write checkpoint {}", self.path.display()))?;

        info!("💾 Checkpoint saved: last_processed_id={:?}", checkpoint.last_processed_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), SyncCheckpoint::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested").join("state.json"));
        let checkpoint = SyncCheckpoint {
            last_processed_id: Some("18c2f0".to_string()),
        };

        store.save(&checkpoint).unwrap();
        assert_eq!(store.load().unwrap(), checkpoint);
    }

    #[test]
    fn test_reads_null_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"last_processed_id": null}"#).unwrap();

        let checkpoint = CheckpointStore::new(&path).load().unwrap();
        assert_eq!(checkpoint.last_processed_id, None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        assert!(CheckpointStore::new(&path).load().is_err());
    }
}
