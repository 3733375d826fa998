//! Per-database process-wide state (spec §2 "Shared arena & registry", §3
//! "Shared index state"). In this crate "per-database" is modeled by one
//! `Registry` instance the embedding application owns; it plays the role of
//! the lazily-created, reference-counted dynamic shared memory segment the
//! spec describes, minus the literal shared-memory part (see
//! `concurrency::arena`).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::concurrency::arena::Arena;
use crate::concurrency::lock::IndexLock;
use crate::core::config::IndexOptions;
use crate::core::types::IndexId;
use crate::memtable::table::Memtable;

/// `{ index_id, heap_id, memtable_handle, lock }` (spec §3). The corpus
/// totals (`N`, `L_sum`, `Σidf`) spec §3 also names live durably in the
/// metapage and are recomputed per-scan by `DataSource::open` from the
/// metapage plus the live memtable — there is no second cached copy here to
/// keep in sync.
pub struct SharedIndexState {
    pub index_id: IndexId,
    pub options: IndexOptions,
    pub arena: Arc<Arena>,
    pub memtable: Memtable,
    pub lock: IndexLock,
}

impl SharedIndexState {
    pub fn new(index_id: IndexId, options: IndexOptions, arena_capacity: usize) -> Self {
        let arena = Arc::new(Arena::new(arena_capacity));
        SharedIndexState { index_id, options, memtable: Memtable::new(arena.clone(), 16), arena, lock: IndexLock::new() }
    }
}

/// Database-wide registry: `index_id -> shared_state`. Concurrent inserts and
/// removes are serialized by the registry's own lock, mirroring the host's
/// `dshash`-partitioned global table.
#[derive(Default)]
pub struct Registry {
    states: RwLock<HashMap<IndexId, Arc<SharedIndexState>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { states: RwLock::new(HashMap::new()) }
    }

    /// First backend to create or open an index lazily creates its shared
    /// state; later attaches just look it up (spec invariant 7).
    pub fn get_or_create(
        &self,
        index_id: IndexId,
        make_options: impl FnOnce() -> IndexOptions,
        arena_capacity: usize,
    ) -> Arc<SharedIndexState> {
        if let Some(existing) = self.states.read().get(&index_id) {
            return existing.clone();
        }
        let mut states = self.states.write();
        states
            .entry(index_id)
            .or_insert_with(|| Arc::new(SharedIndexState::new(index_id, make_options(), arena_capacity)))
            .clone()
    }

    pub fn get(&self, index_id: IndexId) -> Option<Arc<SharedIndexState>> {
        self.states.read().get(&index_id).cloned()
    }

    /// Drops an index's shared state. Remaining `Arc` holders (e.g. an
    /// in-flight scan) keep a valid, if now-orphaned, reference — a
    /// concurrent drop surfaces to them as `ErrorKind::Conflict` when they
    /// next try to look the state up by id.
    pub fn remove(&self, index_id: IndexId) {
        self.states.write().remove(&index_id);
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = Registry::new();
        let id = IndexId(1);
        let a = registry.get_or_create(id, || IndexOptions::new("simple"), 1 << 20);
        let b = registry.get_or_create(id, || IndexOptions::new("simple"), 1 << 20);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_detaches_from_registry() {
        let registry = Registry::new();
        let id = IndexId(7);
        registry.get_or_create(id, || IndexOptions::new("simple"), 1 << 20);
        registry.remove(id);
        assert!(registry.get(id).is_none());
    }
}
