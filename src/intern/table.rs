//! Concurrent string interning table (spec §4.1).
//!
//! The source's zero-allocation probe is a C-specific trick (a tagged union
//! key so the hash/compare callbacks can dispatch on "borrowed bytes" vs
//! "arena pointer" without copying the probe). Rust's `HashMap<Box<str>, V>`
//! already gives us that for free: `get(&str)` hashes and compares through
//! `Borrow<str>` without allocating, so the tagged-union key the design note
//! in spec §9 describes collapses into "just use `Box<str>` keys and borrow
//! at lookup". Arena residency of *stored* keys is still real: a term is
//! copied into an owned `Box<str>` exactly once, on first insertion, and
//! every later probe for that term is allocation-free.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::concurrency::arena::Arena;
use crate::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermHandle(pub u32);

struct Shard {
    map: HashMap<Box<str>, TermHandle>,
}

pub struct InternTable {
    shards: Vec<RwLock<Shard>>,
    terms: RwLock<Vec<Box<str>>>,
    arena: Arc<Arena>,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl InternTable {
    pub fn new(arena: Arc<Arena>, num_shards: usize) -> Self {
        let num_shards = num_shards.max(1);
        InternTable {
            shards: (0..num_shards).map(|_| RwLock::new(Shard { map: HashMap::new() })).collect(),
            terms: RwLock::new(Vec::new()),
            arena,
        }
    }

    fn shard_index(&self, term: &str) -> usize {
        (fnv1a(term.as_bytes()) as usize) % self.shards.len()
    }

    /// Lookup without allocating the probe key.
    pub fn lookup(&self, term: &str) -> Option<TermHandle> {
        let shard = self.shards[self.shard_index(term)].read();
        shard.map.get(term).copied()
    }

    /// Returns the existing handle, or interns `term` (copying it into the
    /// arena budget) and returns the new handle.
    pub fn insert_or_get(&self, term: &str) -> Result<TermHandle> {
        if let Some(handle) = self.lookup(term) {
            return Ok(handle);
        }
        self.arena.reserve(term.len() + std::mem::size_of::<Box<str>>())?;
        let idx = self.shard_index(term);
        let mut shard = self.shards[idx].write();
        // Re-check under the write lock: another writer may have raced us.
        if let Some(handle) = shard.map.get(term) {
            self.arena.release(term.len() + std::mem::size_of::<Box<str>>());
            return Ok(*handle);
        }
        let stored: Box<str> = term.into();
        let mut terms = self.terms.write();
        let handle = TermHandle(terms.len() as u32);
        terms.push(stored.clone());
        shard.map.insert(stored, handle);
        Ok(handle)
    }

    /// Resolves a handle back to its term bytes.
    pub fn resolve(&self, handle: TermHandle) -> Option<Box<str>> {
        self.terms.read().get(handle.0 as usize).cloned()
    }

    pub fn delete(&self, term: &str) {
        let idx = self.shard_index(term);
        self.shards[idx].write().map.remove(term);
        // Note: the reverse `terms` table is append-only (handles must stay
        // stable for any posting lists that still reference them); a
        // removed term's slot simply becomes unreachable by lookup.
        self.arena.release(term.len() + std::mem::size_of::<Box<str>>());
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            let mut shard = shard.write();
            for term in shard.map.keys() {
                self.arena.release(term.len() + std::mem::size_of::<Box<str>>());
            }
            shard.map.clear();
        }
        self.terms.write().clear();
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequential iteration over every interned term, holding a shard's lock
    /// only for the duration of copying its keys out.
    pub fn terms_snapshot(&self) -> Vec<(Box<str>, TermHandle)> {
        let mut out = Vec::with_capacity(self.len());
        for shard in &self.shards {
            let shard = shard.read();
            out.extend(shard.map.iter().map(|(k, v)| (k.clone(), *v)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> InternTable {
        InternTable::new(Arc::new(Arena::new(1 << 20)), 4)
    }

    #[test]
    fn insert_then_lookup_is_stable() {
        let t = table();
        let h1 = t.insert_or_get("brown").unwrap();
        let h2 = t.insert_or_get("brown").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(t.lookup("brown"), Some(h1));
        assert_eq!(t.lookup("missing"), None);
    }

    #[test]
    fn distinct_terms_get_distinct_handles() {
        let t = table();
        let a = t.insert_or_get("fox").unwrap();
        let b = t.insert_or_get("dog").unwrap();
        assert_ne!(a, b);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn clear_empties_the_table_and_releases_arena() {
        let arena = Arc::new(Arena::new(1 << 20));
        let t = InternTable::new(arena.clone(), 4);
        t.insert_or_get("alpha").unwrap();
        t.insert_or_get("beta").unwrap();
        assert!(arena.used() > 0);
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn out_of_memory_is_surfaced() {
        let t = InternTable::new(Arc::new(Arena::new(2)), 1);
        assert!(t.insert_or_get("this term is definitely too long").is_err());
    }
}
