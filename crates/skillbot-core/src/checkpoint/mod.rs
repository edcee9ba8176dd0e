//! Conversation checkpoints — durable per-thread turn log plus scratch state.
//!
//! A checkpoint is everything needed to resume a thread exactly: the ordered
//! turn sequence, the capability scratch state, and the pending approval (if
//! the thread is suspended). Writes go through [`CheckpointStore::append`],
//! which either records the whole update or leaves the prior checkpoint as is.
//!
//! Two stores are provided:
//! - [`JsonlCheckpointStore`] — one JSONL file per thread, atomic replace on write.
//! - [`MemoryCheckpointStore`] — process-local, for tests and ephemeral runs.

pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{Message, PendingApproval, ScratchState};

pub use file::JsonlCheckpointStore;
pub use memory::MemoryCheckpointStore;

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Infrastructure failures of a checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize checkpoint for thread '{thread_id}': {source}")]
    Serialize {
        thread_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt checkpoint record in {path} at line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint file {path} belongs to thread '{found}', not '{expected}'")]
    ThreadMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),
}

// ─────────────────────────────────────────────
// Checkpoint
// ─────────────────────────────────────────────

/// Durable snapshot of one thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    pub turns: Vec<Message>,
    pub scratch: ScratchState,
    pub pending: Option<PendingApproval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// An empty checkpoint for a thread that has never been written.
    pub fn empty(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Checkpoint {
            thread_id: thread_id.into(),
            turns: Vec::new(),
            scratch: ScratchState::default(),
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_new(&self) -> bool {
        self.turns.is_empty() && self.pending.is_none()
    }

    /// Apply an update in memory.
    pub fn apply(&mut self, update: CheckpointUpdate) {
        self.turns.extend(update.new_turns);
        self.scratch = update.scratch;
        self.pending = update.pending;
        self.updated_at = Utc::now();
    }

    /// Text of the most recent assistant answer, if any.
    pub fn last_answer(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|m| match m {
            Message::Assistant {
                content: Some(text),
                tool_calls: None,
            } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// One atomic write: turns to append plus the replacement scratch state and
/// pending approval.
#[derive(Clone, Debug, Default)]
pub struct CheckpointUpdate {
    pub new_turns: Vec<Message>,
    pub scratch: ScratchState,
    pub pending: Option<PendingApproval>,
}

/// Header record written as the first line of a thread file.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CheckpointHeader {
    #[serde(rename = "_type")]
    pub record_type: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub scratch: ScratchState,
    #[serde(default)]
    pub pending: Option<PendingApproval>,
}

pub(crate) const HEADER_TYPE: &str = "checkpoint";

// ─────────────────────────────────────────────
// Store trait
// ─────────────────────────────────────────────

/// Persistence boundary for thread checkpoints.
///
/// Implementations isolate threads by id and must make `append` atomic.
pub trait CheckpointStore: Send + Sync {
    /// Load a thread's checkpoint; an unknown thread yields an empty one.
    fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError>;

    /// Append turns and replace scratch/pending state as one unit.
    ///
    /// Returns the checkpoint as written.
    fn append(&self, thread_id: &str, update: CheckpointUpdate)
        -> Result<Checkpoint, CheckpointError>;
}
