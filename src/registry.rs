//! Instance Registry — the shared object-id -> dialog lookup table.
//!
//! Grounded in `go-ari-library.go`'s `proxyInstanceMap` (a `map[string]*ID`
//! guarded by a `sync.RWMutex`). `tokio::sync::RwLock` gives the same
//! concurrent-readers, exclusive-writer shape without blocking the async
//! runtime's worker threads on a std mutex (spec.md §4.C).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::dialog::DialogInstance;

/// Maps an object id (channel/bridge/playback/recording id) to the dialog
/// that currently owns it. A busy event stream reads this far more often
/// than dialogs are born or torn down, so reads never serialize on each
/// other (spec.md §4.C, invariant I1).
#[derive(Default)]
pub struct InstanceRegistry {
    table: RwLock<HashMap<String, Arc<DialogInstance>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to `dialog`, replacing any existing binding. A rebind is
    /// not an error: the old dialog's other objects remain registered under
    /// it until its own teardown (spec.md §9, Open Question 1).
    pub async fn add(&self, id: String, dialog: Arc<DialogInstance>) {
        self.table.write().await.insert(id, dialog);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<DialogInstance>> {
        self.table.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.table.write().await.remove(id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.table.read().await.len()
    }
}
