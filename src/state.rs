//! Persisted relayer state
//!
//! A single versioned JSON document holds both directions' scan cursors and
//! skip caches. It is rewritten after every tick via write-temp-then-rename,
//! so the on-disk file is always one complete snapshot. A crash mid-write
//! leaves either the previous or the new document, never a torn one. Only
//! the orchestrator mutates the state; there is no locking.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const STATE_SCHEMA: u32 = 1;

/// Last successfully relayed transfer for one direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    pub nonce: String,
    pub block_number: u64,
    pub source_tx: String,
    pub dest_tx: String,
}

/// Scan position on one chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainCursor {
    /// Next unscanned block; 0 = auto (resolved to the safe head on first tick)
    pub next_block: u64,
    pub last_seen_block: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<ProcessedRecord>,
}

/// Cursor plus grow-only nonce skip cache for one relay direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectionState {
    pub cursor: ChainCursor,
    /// nonce (decimal string) to the reason the nonce must never run again
    #[serde(default)]
    pub skip: BTreeMap<String, String>,
}

impl DirectionState {
    pub fn skip_reason(&self, nonce: &str) -> Option<&String> {
        self.skip.get(nonce)
    }

    pub fn mark_skipped(&mut self, nonce: String, reason: String) {
        self.skip.entry(nonce).or_insert(reason);
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayerState {
    pub schema: u32,
    pub updated_at: Option<DateTime<Utc>>,
    pub forward: DirectionState,
    pub reverse: DirectionState,
}

impl RelayerState {
    /// Fresh state with per-direction cursor overrides (0 = auto).
    pub fn with_overrides(forward_from_block: u64, reverse_from_block: u64) -> Self {
        Self {
            schema: STATE_SCHEMA,
            updated_at: None,
            forward: DirectionState {
                cursor: ChainCursor {
                    next_block: forward_from_block,
                    ..Default::default()
                },
                skip: BTreeMap::new(),
            },
            reverse: DirectionState {
                cursor: ChainCursor {
                    next_block: reverse_from_block,
                    ..Default::default()
                },
                skip: BTreeMap::new(),
            },
        }
    }
}

/// Owns the state file path; load at startup, save after every tick.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, or construct the default when the file is
    /// absent, unreadable, or a reset was requested. A corrupt file falls
    /// back to the default: with auto cursors that means "resume from the
    /// safe head", never a crash loop.
    pub fn load(&self, reset: bool, default: RelayerState) -> RelayerState {
        if reset {
            warn!(path = %self.path.display(), "State reset requested, discarding persisted state");
            return default;
        }

        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<RelayerState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Persisted state unreadable, starting from defaults"
                    );
                    default
                }
            },
            Err(_) => default,
        }
    }

    /// Serialize the whole state and atomically replace the file.
    pub fn save(&self, state: &RelayerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let serialized =
            serde_json::to_string_pretty(state).wrap_err("Failed to serialize relayer state")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .wrap_err_with(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("Failed to rename {} into place", tmp.display()))?;
        Ok(())
    }
}
