//! Per-environment state snapshots
//!
//! A snapshot mirrors the validated IR into a persisted JSON document at
//! `<state_dir>/<env>.state`. Writes go through a temp file and an atomic
//! rename so a partial write can never corrupt the previous snapshot, and
//! an advisory lock file keeps concurrent applies off the same
//! environment.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MedallionError;
use crate::model::Model;

use super::fingerprint::fingerprint;

/// Bump when the snapshot layout changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotColumn {
    pub name: String,
    pub description: String,
    pub nullable: bool,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotModel {
    pub name: String,
    pub layer: String,
    pub kind: String,
    pub dependencies: Vec<String>,
    pub columns: Vec<SnapshotColumn>,
    pub logic_hash: String,
    pub schema_hash: String,
    pub metadata_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub environment: String,
    pub generated_at: String,
    pub models: BTreeMap<String, SnapshotModel>,
}

impl Snapshot {
    /// Mirror the current IR into a snapshot for `environment`.
    pub fn capture(environment: &str, models: &BTreeMap<String, Model>) -> Self {
        let entries = models
            .iter()
            .map(|(name, model)| (name.clone(), SnapshotModel::capture(model)))
            .collect();
        Snapshot {
            version: SNAPSHOT_VERSION,
            environment: environment.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            models: entries,
        }
    }

    /// Snapshot file path for an environment.
    pub fn path_for(state_dir: &Path, environment: &str) -> PathBuf {
        state_dir.join(format!("{}.state", environment))
    }

    /// Load a snapshot, failing fatally on a malformed file rather than
    /// ever overwriting it.
    pub fn load(state_dir: &Path, environment: &str) -> Result<Self, MedallionError> {
        let path = Self::path_for(state_dir, environment);
        if !path.exists() {
            return Err(MedallionError::SnapshotMissing {
                environment: environment.to_string(),
                path,
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| MedallionError::IoError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| MedallionError::SnapshotMalformed {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MedallionError::SnapshotMalformed {
                path,
                message: format!(
                    "unsupported snapshot version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        Ok(snapshot)
    }

    pub fn exists(state_dir: &Path, environment: &str) -> bool {
        Self::path_for(state_dir, environment).exists()
    }

    /// Persist atomically: write a temp file next to the target, flush,
    /// then rename over it.
    pub fn save(&self, state_dir: &Path) -> Result<(), MedallionError> {
        let path = Self::path_for(state_dir, &self.environment);
        fs::create_dir_all(state_dir).map_err(|e| MedallionError::SnapshotWriteError {
            path: path.clone(),
            source: e,
        })?;

        let content = serde_json::to_string_pretty(self).map_err(|e| MedallionError::IoError {
            message: format!("failed to serialize snapshot: {}", e),
        })?;

        let temp_path = path.with_extension("state.tmp");
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| MedallionError::SnapshotWriteError {
                    path: temp_path.clone(),
                    source: e,
                })?;
            file.write_all(content.as_bytes())
                .map_err(|e| MedallionError::SnapshotWriteError {
                    path: temp_path.clone(),
                    source: e,
                })?;
            file.sync_all().map_err(|e| MedallionError::SnapshotWriteError {
                path: temp_path.clone(),
                source: e,
            })?;
        }
        fs::rename(&temp_path, &path).map_err(|e| MedallionError::SnapshotWriteError {
            path,
            source: e,
        })?;
        Ok(())
    }
}

impl SnapshotModel {
    pub fn capture(model: &Model) -> Self {
        let fingerprints = fingerprint(model);
        SnapshotModel {
            name: model.name.clone(),
            layer: model.layer.as_str().to_string(),
            kind: model.kind.as_str().to_string(),
            dependencies: model.depends_on.clone(),
            columns: model
                .columns
                .iter()
                .map(|c| SnapshotColumn {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    nullable: !model.is_column_not_null(&c.name),
                    data_type: c.data_type.clone(),
                })
                .collect(),
            logic_hash: fingerprints.logic_hex(),
            schema_hash: fingerprints.schema_hex(),
            metadata_hash: fingerprints.metadata_hex(),
        }
    }
}

/// Advisory lock over an environment's snapshot file.
///
/// Held for the duration of an apply; a second process fails fast instead
/// of racing the write. Released on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(state_dir: &Path, environment: &str) -> Result<Self, MedallionError> {
        fs::create_dir_all(state_dir).map_err(|e| MedallionError::IoError {
            message: format!("failed to create {}: {}", state_dir.display(), e),
        })?;
        let path = state_dir.join(format!("{}.state.lock", environment));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(StateLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(MedallionError::SnapshotLocked { path })
            }
            Err(e) => Err(MedallionError::IoError {
                message: format!("failed to create lock {}: {}", path.display(), e),
            }),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
