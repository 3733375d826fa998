//! Stand-in for the source's dynamic shared memory arena (spec §2, §9).
//!
//! The real engine hands out arena-relative offsets so many backend
//! processes can dereference the same bytes after independently mapping the
//! segment. This crate is a single-process library, so "shared memory" is
//! just heap memory behind an `Arc`; what we keep from the original design is
//! the *discipline*: a byte budget that every memtable/interning allocation
//! is checked against, so `OutOfMemory` is a real, reachable, fatal-to-
//! transaction error rather than something only a 64-bit address space ever
//! hits in practice.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::error::{Error, Result};

pub struct Arena {
    used: AtomicUsize,
    capacity: AtomicUsize,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Arena { used: AtomicUsize::new(0), capacity: AtomicUsize::new(capacity) }
    }

    pub fn unbounded() -> Self {
        Arena::new(usize::MAX)
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Re-budgets the arena in place. Used to shrink a build-time (often
    /// unbounded) arena down to its steady-state runtime cap once a build
    /// finishes, without disturbing the `Arc<Arena>` pointers already held
    /// by the memtable and interning table.
    pub fn set_capacity(&self, new_capacity: usize) {
        self.capacity.store(new_capacity, Ordering::Relaxed);
    }

    /// Reserves `n` bytes against the budget. Fatal to the caller's
    /// transaction on failure (spec §4.2: "allocation failures in the arena
    /// are fatal for the current transaction").
    pub fn reserve(&self, n: usize) -> Result<()> {
        loop {
            let current = self.used.load(Ordering::Relaxed);
            let next = current.checked_add(n).ok_or_else(|| {
                Error::out_of_memory("arena byte budget overflowed")
            })?;
            let capacity = self.capacity();
            if next > capacity {
                return Err(Error::out_of_memory(format!(
                    "arena exhausted: {current} + {n} > {capacity}"
                )));
            }
            if self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    pub fn release(&self, n: usize) {
        self.used.fetch_sub(n.min(self.used.load(Ordering::Relaxed)), Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_past_capacity_fails() {
        let arena = Arena::new(100);
        arena.reserve(60).unwrap();
        assert!(arena.reserve(60).is_err());
        arena.release(60);
        arena.reserve(60).unwrap();
    }
}
