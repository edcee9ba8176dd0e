//! In-memory checkpoint store.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Checkpoint, CheckpointError, CheckpointStore, CheckpointUpdate};

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one write.
    pub fn len(&self) -> usize {
        self.threads.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, thread_id: &str) -> Result<Checkpoint, CheckpointError> {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        Ok(threads
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| Checkpoint::empty(thread_id)))
    }

    fn append(
        &self,
        thread_id: &str,
        update: CheckpointUpdate,
    ) -> Result<Checkpoint, CheckpointError> {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        let checkpoint = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| Checkpoint::empty(thread_id));
        checkpoint.apply(update);
        Ok(checkpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryCheckpointStore::new();
        assert!(store.is_empty());

        store
            .append(
                "t1",
                CheckpointUpdate {
                    new_turns: vec![Message::user("a"), Message::assistant("b")],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .append(
                "t1",
                CheckpointUpdate {
                    new_turns: vec![Message::user("c")],
                    ..Default::default()
                },
            )
            .unwrap();

        let cp = store.load("t1").unwrap();
        assert_eq!(
            cp.turns,
            vec![Message::user("a"), Message::assistant("b"), Message::user("c")]
        );
        assert_eq!(cp.last_answer(), Some("b"));
        assert_eq!(store.len(), 1);
    }
}
