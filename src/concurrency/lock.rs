//! Per-index reader/writer lock, held for the whole duration of a
//! transaction rather than per-operation (spec §5).
//!
//! Readers take shared once at scan start and release at scan end; writers
//! take exclusive from the start (no upgrade path, matching the source).
//! `TxnGuard` is the "scoped guard returned by `begin_txn`" design note in
//! spec §9: its `Drop` runs the release-locks / reset-counters sequence a
//! transaction callback would run in the original host.

use parking_lot::lock_api::RawRwLock as _;
use parking_lot::RawRwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// One per-index lock, living inside `SharedIndexState`.
pub struct IndexLock {
    raw: RawRwLock,
}

impl IndexLock {
    pub fn new() -> Self {
        IndexLock { raw: RawRwLock::INIT }
    }
}

impl Default for IndexLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII transaction guard. Acquires the lock in `mode` on construction and
/// releases it on drop — "acquired once per transaction", per spec §5.
pub struct TxnGuard<'a> {
    lock: &'a IndexLock,
    mode: LockMode,
    terms_added: usize,
}

impl<'a> TxnGuard<'a> {
    pub fn acquire(lock: &'a IndexLock, mode: LockMode) -> Self {
        match mode {
            LockMode::Shared => lock.raw.lock_shared(),
            LockMode::Exclusive => lock.raw.lock_exclusive(),
        }
        TxnGuard { lock, mode, terms_added: 0 }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Bulk-load counter, checked at pre-commit against
    /// `Config::bulk_load_threshold` to decide whether to force a spill
    /// before this transaction's lock is released.
    pub fn record_terms_added(&mut self, n: usize) {
        self.terms_added += n;
    }

    pub fn terms_added(&self) -> usize {
        self.terms_added
    }
}

impl Drop for TxnGuard<'_> {
    fn drop(&mut self) {
        match self.mode {
            LockMode::Shared => unsafe { self.lock.raw.unlock_shared() },
            LockMode::Exclusive => unsafe { self.lock.raw.unlock_exclusive() },
        }
    }
}

// SAFETY: RawRwLock is Send+Sync by construction (parking_lot guarantees
// this); IndexLock adds no non-Sync state of its own.
unsafe impl Send for IndexLock {}
unsafe impl Sync for IndexLock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_excludes_shared() {
        let lock = IndexLock::new();
        let guard = TxnGuard::acquire(&lock, LockMode::Exclusive);
        assert!(lock.raw.try_lock_shared() == false || {
            // if it somehow succeeded, undo it before the assertion below
            unsafe { lock.raw.unlock_shared() };
            false
        });
        drop(guard);
        assert!(lock.raw.try_lock_shared());
        unsafe { lock.raw.unlock_shared() };
    }
}
