//! Persisted per-channel ledger of previously emitted items, plus the atomic
//! commit of state and artifact.

use crate::types::{JournalistError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Ledger entry for one item identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Immutable once recorded.
    pub published_at: DateTime<Utc>,
    /// Monotonically non-decreasing; bumped on fingerprint change.
    pub updated_at: DateTime<Utc>,
    /// Content fingerprint at the last generation that saw this item.
    pub fingerprint: Uuid,
    /// Last generation run that observed the item; drives retention eviction.
    pub last_seen: DateTime<Utc>,
}

/// Mapping from item identity to its ledger entry. BTreeMap keeps the
/// serialized form stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub entries: BTreeMap<Uuid, StateEntry>,
}

impl ChannelState {
    pub fn get(&self, id: &Uuid) -> Option<&StateEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop ledger entries not observed since the cutoff. Entries inside the
    /// retention window survive even when absent from the latest run, so a
    /// stale item cannot resurface as new.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_seen >= cutoff);
        before - self.entries.len()
    }
}

/// File-backed channel state store. One JSON ledger per channel, committed
/// together with the generated artifact via temp-file-and-rename.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn state_path(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}.state.json", channel))
    }

    /// Load the ledger for a channel. A missing file is an empty state, not
    /// an error; an unreadable or inconsistent ledger refuses to proceed
    /// rather than silently resetting history.
    pub fn load(&self, channel: &str) -> Result<ChannelState> {
        let path = self.state_path(channel);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no prior state for channel {}", channel);
                return Ok(ChannelState::default());
            }
            Err(e) => {
                return Err(JournalistError::StateCorruption {
                    channel: channel.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let state: ChannelState =
            serde_json::from_str(&raw).map_err(|e| JournalistError::StateCorruption {
                channel: channel.to_string(),
                message: e.to_string(),
            })?;

        for (id, entry) in &state.entries {
            if entry.updated_at < entry.published_at {
                return Err(JournalistError::StateCorruption {
                    channel: channel.to_string(),
                    message: format!("entry {} has updated_at before published_at", id),
                });
            }
        }

        debug!("loaded {} ledger entries for channel {}", state.len(), channel);
        Ok(state)
    }

    /// Persist the updated ledger together with the generated artifact.
    /// Both payloads are fully written to temp files before either rename,
    /// so a failed run leaves the previous generation authoritative.
    pub fn commit(
        &self,
        channel: &str,
        state: &ChannelState,
        artifact_bytes: &[u8],
        artifact_path: &Path,
    ) -> Result<()> {
        let state_bytes =
            serde_json::to_vec_pretty(state).map_err(|e| JournalistError::Commit(e.to_string()))?;

        let state_path = self.state_path(channel);
        let state_tmp = tmp_path(&state_path);
        let artifact_tmp = tmp_path(artifact_path);

        if let Some(parent) = artifact_path.parent() {
            fs::create_dir_all(parent).map_err(|e| JournalistError::Commit(e.to_string()))?;
        }

        if let Err(e) = fs::write(&state_tmp, &state_bytes)
            .and_then(|_| fs::write(&artifact_tmp, artifact_bytes))
        {
            let _ = fs::remove_file(&state_tmp);
            let _ = fs::remove_file(&artifact_tmp);
            return Err(JournalistError::Commit(e.to_string()));
        }

        if let Err(e) =
            fs::rename(&state_tmp, &state_path).and_then(|_| fs::rename(&artifact_tmp, artifact_path))
        {
            let _ = fs::remove_file(&state_tmp);
            let _ = fs::remove_file(&artifact_tmp);
            return Err(JournalistError::Commit(e.to_string()));
        }

        info!(
            "committed channel {}: {} ledger entries, {} artifact bytes",
            channel,
            state.len(),
            artifact_bytes.len()
        );
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Overwrite a standalone artifact (OPML index, merge output) atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| JournalistError::Commit(e.to_string()))?;
        }
    }

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(JournalistError::Commit(e.to_string()));
    }
    Ok(())
}
