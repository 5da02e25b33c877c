//! Thread-safe registry of worker listening addresses.
//!
//! Ids start at 1 and grow by one per distinct address, in first-seen order.
//! Registering an address again returns the id it already holds. Nothing is
//! persisted: after a coordinator restart every worker must register again.

use crate::types::WorkerId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A registered worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerEntry {
    pub worker_id: WorkerId,
    pub address: String,
}

/// Outcome of [`WorkerRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// The address was unknown and received a new id.
    New(WorkerId),
    /// The address was already on file with this id.
    Existing(WorkerId),
}

impl Registration {
    pub const fn worker_id(self) -> WorkerId {
        match self {
            Self::New(id) | Self::Existing(id) => id,
        }
    }

    pub const fn is_new(self) -> bool {
        matches!(self, Self::New(_))
    }
}

#[derive(Debug, Default)]
struct Workers {
    by_address: HashMap<String, WorkerId>,
    // Indexed by `worker_id - 1`.
    entries: Vec<WorkerEntry>,
}

/// Address to worker id map guarded by a single lock. The lock is only held
/// for the map lookup or update itself.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Mutex<Workers>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id on file for `address`, assigning the next one if none.
    pub fn register(&self, address: impl Into<String>) -> Registration {
        let address = address.into();
        let mut workers = self.workers.lock();

        if let Some(&worker_id) = workers.by_address.get(&address) {
            return Registration::Existing(worker_id);
        }

        let worker_id = workers.entries.len() as WorkerId + 1;
        workers.by_address.insert(address.clone(), worker_id);
        workers.entries.push(WorkerEntry { worker_id, address });
        Registration::New(worker_id)
    }

    /// Snapshot of every registered worker, ordered by id.
    pub fn list(&self) -> Vec<WorkerEntry> {
        self.workers.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.workers.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
