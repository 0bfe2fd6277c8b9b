//! Process-lifetime mutable state shared by every request.

use std::collections::HashMap;

use mysb_metrics::{metric_defs, metrics};
use parking_lot::Mutex;

/// Highest id auto-assignment will hand out. 255 is the broadcast id.
pub const MAX_ASSIGNABLE_ID: u16 = 254;

/// Id counter and staged bootloader replies.
///
/// Both are only reachable through atomic operations: [`next_id`] reads and
/// bumps the counter under one lock, and [`take_pending`] checks and removes
/// under one lock.
///
/// [`next_id`]: SessionState::next_id
/// [`take_pending`]: SessionState::take_pending
#[derive(Debug)]
pub struct SessionState {
    last_id: Mutex<u16>,
    pending: Mutex<HashMap<String, String>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SessionState {
    /// Create state whose first assigned id is `last_id + 1`.
    pub fn new(last_id: u16) -> Self {
        SessionState {
            last_id: Mutex::new(last_id),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Assign the next node id, or `None` once the id space is exhausted.
    pub fn next_id(&self) -> Option<u16> {
        let mut last = self.last_id.lock();
        if *last >= MAX_ASSIGNABLE_ID {
            return None;
        }
        *last += 1;
        metrics::counter!(metric_defs::IDS_ASSIGNED.name).increment(1);
        Some(*last)
    }

    /// Most recently assigned id (or the configured starting value).
    pub fn last_id(&self) -> u16 {
        *self.last_id.lock()
    }

    /// Stage a reply for `node_id`, replacing any earlier one.
    ///
    /// Returns the replaced payload, if any.
    pub fn stage(&self, node_id: &str, payload: String) -> Option<String> {
        let mut pending = self.pending.lock();
        let previous = pending.insert(node_id.to_string(), payload);
        metrics::gauge!(metric_defs::BOOTLOADER_PENDING.name).set(pending.len() as f64);
        previous
    }

    /// Remove and return the staged reply for `node_id`.
    pub fn take_pending(&self, node_id: &str) -> Option<String> {
        let mut pending = self.pending.lock();
        let taken = pending.remove(node_id);
        if taken.is_some() {
            metrics::gauge!(metric_defs::BOOTLOADER_PENDING.name).set(pending.len() as f64);
        }
        taken
    }

    /// Number of staged replies.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
