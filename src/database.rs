//! Process-wide shared state (spec §2 "Shared arena & registry", §5).
//!
//! One `Database` plays the role of the host's per-database dynamic shared
//! memory segment: a `Registry` mapping `index_id -> shared_index_state`,
//! lazily populated by whichever caller opens a given index first, attached
//! to (not recreated by) every later `open` of the same `id` (invariant 7).
//! A real multi-process host gets this for free from shared memory; a
//! library crate gets it by holding one `Database` value shared (typically
//! via `Arc`) across every caller that might open the same index concurrently.

use std::path::Path;

use crate::concurrency::registry::Registry;
use crate::core::config::{Config, IndexOptions};
use crate::core::error::Result;
use crate::core::types::IndexId;
use crate::index::Index;

#[derive(Default)]
pub struct Database {
    registry: Registry,
}

impl Database {
    pub fn new() -> Self {
        Database { registry: Registry::new() }
    }

    /// Opens `path` as `id`, attaching to (or lazily creating) this
    /// database's shared state for that index. Two `open` calls for the
    /// same `id` from the same `Database` share one memtable and lock.
    pub fn open(&self, id: IndexId, path: impl AsRef<Path>, options: IndexOptions, config: Config) -> Result<Index> {
        Index::open_with_registry(&self.registry, id, path, options, config)
    }

    /// Drops `id`'s shared state. Any `Index` handle still holding an
    /// `Arc` to it keeps working in isolation; a fresh `open` after this
    /// call lazily recreates the state rather than attaching to the old one.
    pub fn drop_index(&self, id: IndexId) {
        self.registry.remove(id);
    }

    pub fn index_count(&self) -> usize {
        self.registry.len()
    }
}
