//! JSONL checkpoint store.
//!
//! File format: `{dir}/{encoded_thread_id}.jsonl` (see [`utils::safe_filename`])
//! - Line 1: `{"_type":"checkpoint","thread_id":"...","created_at":"...","updated_at":"...","scratch":{},"pending":null}`
//! - Line 2+: one message per line, in turn order
//!
//! Every write renders the whole file into a temp file in the same directory
//! and renames it over the old one, so a crash mid-write leaves the previous
//! checkpoint intact.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{
    Checkpoint, CheckpointError, CheckpointHeader, CheckpointStore, CheckpointUpdate,
    HEADER_TYPE,
};
use crate::types::Message;
use crate::utils;

/// File-backed checkpoint store with an in-memory cache.
///
/// The cache write lock is held across each disk write, so appends are
/// serialized within the process.
pub struct JsonlCheckpointStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Checkpoint>>,
}

impl JsonlCheckpointStore {
    /// Open (and create if needed) a checkpoint directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(JsonlCheckpointStore {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", utils::safe_filename(thread_id)))
    }

    fn read_from_disk(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(Checkpoint::empty(thread_id));
        }

        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };
        let file = std::fs::File::open(&path).map_err(io_err)?;
        let reader = std::io::BufReader::new(file);

        let mut checkpoint = Checkpoint::empty(thread_id);
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |source| CheckpointError::Corrupt {
                path: path.clone(),
                line: idx + 1,
                source,
            };
            if idx == 0 {
                let header: CheckpointHeader = serde_json::from_str(&line).map_err(corrupt)?;
                if header.thread_id != thread_id {
                    return Err(CheckpointError::ThreadMismatch {
                        path: path.clone(),
                        expected: thread_id.to_string(),
                        found: header.thread_id,
                    });
                }
                checkpoint.created_at = header.created_at;
                checkpoint.updated_at = header.updated_at;
                checkpoint.scratch = header.scratch;
                checkpoint.pending = header.pending;
            } else {
                let msg: Message = serde_json::from_str(&line).map_err(corrupt)?;
                checkpoint.turns.push(msg);
            }
        }

        debug!(
            thread_id = %thread_id,
            turns = checkpoint.turns.len(),
            "Loaded checkpoint from disk"
        );
        Ok(checkpoint)
    }

    fn write_to_disk(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.thread_path(&checkpoint.thread_id);
        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };
        let ser_err = |source| CheckpointError::Serialize {
            thread_id: checkpoint.thread_id.clone(),
            source,
        };

        let header = CheckpointHeader {
            record_type: HEADER_TYPE.to_string(),
            thread_id: checkpoint.thread_id.clone(),
            created_at: checkpoint.created_at,
            updated_at: checkpoint.updated_at,
            scratch: checkpoint.scratch.clone(),
            pending: checkpoint.pending.clone(),
        };

        let mut body = serde_json::to_string(&header).map_err(ser_err)?;
        body.push('\n');
        for msg in &checkpoint.turns {
            body.push_str(&serde_json::to_string(msg).map_err(ser_err)?);
            body.push('\n');
        }

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(body.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        debug!(
            thread_id = %checkpoint.thread_id,
            turns = checkpoint.turns.len(),
            path = %path.display(),
            "Checkpoint written"
        );
        Ok(())
    }
}

impl CheckpointStore for JsonlCheckpointStore {
    fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cp) = cache.get(thread_id) {
                return Ok(cp.clone());
            }
        }

        let checkpoint = self.read_from_disk(thread_id)?;
        if !checkpoint.is_new() {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(thread_id.to_string(), checkpoint.clone());
        }
        Ok(checkpoint)
    }

    fn append(
        &self,
        thread_id: &str,
        update: CheckpointUpdate,
    ) -> Result<Checkpoint, CheckpointError> {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());

        let mut checkpoint = match cache.get(thread_id) {
            Some(cp) => cp.clone(),
            None => self.read_from_disk(thread_id)?,
        };
        checkpoint.apply(update);

        // Cache is only updated once the file is durably replaced.
        self.write_to_disk(&checkpoint)?;
        cache.insert(thread_id.to_string(), checkpoint.clone());
        Ok(checkpoint)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
