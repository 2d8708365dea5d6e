//! Per-conversation write locks.
//!
//! Serializes mutations of one conversation inside this process (appends
//! compute `MAX(sequence) + 1`; switches rewrite the active pointer). Writes
//! to different conversations proceed in parallel; `BEGIN IMMEDIATE` covers
//! writers in other processes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry of one mutex per conversation ID.
#[derive(Default)]
pub(crate) struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    /// The lock for `conversation_id`, created on first use.
    pub(crate) fn get(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock();
        Arc::clone(
            map.entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop the entry for a deleted conversation.
    pub(crate) fn remove(&self, conversation_id: &str) {
        let _ = self.locks.lock().remove(conversation_id);
    }

    /// Drop the entry unless some caller still holds its handle. Handles are
    /// only cloned under the registry lock, so the count cannot grow here.
    pub(crate) fn prune(&self, conversation_id: &str) {
        let mut map = self.locks.lock();
        if map
            .get(conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            let _ = map.remove(conversation_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
