use crate::stats::RunStats;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("could not read checkpoint {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write checkpoint {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path} is not valid JSON")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk resume state for one adapter. An event lands in
/// `processed_event_ids` only once its scrape produced at least one match —
/// zero-match events (future brackets, empty groups) are revisited next
/// run. Events that threw are marked processed too, so a poisoned event
/// cannot wedge the run loop forever.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub last_event_id: Option<String>,
    pub processed_event_ids: BTreeSet<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub adapter: String,
    #[serde(default)]
    pub stats: RunStats,
}

impl Checkpoint {
    pub fn new(adapter: &str) -> Self {
        Self {
            adapter: adapter.to_string(),
            ..Default::default()
        }
    }

    /// Load the checkpoint, or a fresh one when the file does not exist.
    pub fn load(path: &Path, adapter: &str) -> Result<Self, CheckpointError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new(adapter));
            }
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let checkpoint: Checkpoint =
            serde_json::from_str(&raw).map_err(|source| CheckpointError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(checkpoint)
    }

    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(self).expect("checkpoint serialization");
        std::fs::write(path, json).map_err(|source| CheckpointError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Remove the file after a clean run. Missing files are fine.
    pub fn clear(path: &Path) -> Result<(), CheckpointError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Write {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn mark_processed(&mut self, event_id: &str, now: DateTime<Utc>) {
        self.processed_event_ids.insert(event_id.to_string());
        self.last_event_id = Some(event_id.to_string());
        self.last_run = Some(now);
    }

    pub fn is_processed(&self, event_id: &str) -> bool {
        self.processed_event_ids.contains(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("matchdb-checkpoint-{name}-{}", std::process::id()))
    }

    #[test]
    fn missing_file_loads_fresh() {
        let path = temp_path("missing");
        let cp = Checkpoint::load(&path, "gotsport").unwrap();
        assert_eq!(cp.adapter, "gotsport");
        assert!(cp.processed_event_ids.is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_path("roundtrip");
        let mut cp = Checkpoint::new("gotsport");
        cp.mark_processed("E1", Utc::now());
        cp.stats.matches_staged = 42;
        cp.save(&path).unwrap();

        let loaded = Checkpoint::load(&path, "gotsport").unwrap();
        assert!(loaded.is_processed("E1"));
        assert!(!loaded.is_processed("E2"));
        assert_eq!(loaded.last_event_id.as_deref(), Some("E1"));
        assert_eq!(loaded.stats.matches_staged, 42);

        Checkpoint::clear(&path).unwrap();
        let fresh = Checkpoint::load(&path, "gotsport").unwrap();
        assert!(fresh.processed_event_ids.is_empty());
    }

    #[test]
    fn clear_tolerates_missing_file() {
        Checkpoint::clear(&temp_path("never-existed")).unwrap();
    }

    #[test]
    fn uses_the_wire_field_names() {
        let mut cp = Checkpoint::new("gotsport");
        cp.mark_processed("E1", Utc::now());
        let json = serde_json::to_value(&cp).unwrap();
        assert!(json.get("lastEventId").is_some());
        assert!(json.get("processedEventIds").is_some());
        assert!(json.get("lastRun").is_some());
    }
}
