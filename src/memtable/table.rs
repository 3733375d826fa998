//! In-memory inverted index (spec §4.2).
//!
//! Two maps over the arena — `term_handle -> posting_list` and
//! `doc_ref -> doc_length` — plus the running totals the build orchestrator
//! and scorer both need (`doc_count`, `length_sum`, `total_posting_entries`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::concurrency::arena::Arena;
use crate::core::error::Result;
use crate::core::types::{DocRef, TokenizedTerm};
use crate::intern::table::{InternTable, TermHandle};
use crate::memtable::posting_list::{PostingEntry, PostingList};

#[derive(Debug, Clone, Copy, Default)]
pub struct MemtableStats {
    pub doc_count: u64,
    pub length_sum: u64,
    pub total_posting_entries: u64,
}

pub struct Memtable {
    arena: Arc<Arena>,
    intern: InternTable,
    shards: Vec<RwLock<HashMap<TermHandle, PostingList>>>,
    doc_lengths: RwLock<HashMap<DocRef, i32>>,
    doc_count: AtomicU64,
    length_sum: AtomicU64,
    total_posting_entries: AtomicU64,
}

impl Memtable {
    pub fn new(arena: Arc<Arena>, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Memtable {
            intern: InternTable::new(arena.clone(), shard_count),
            shards: (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect(),
            doc_lengths: RwLock::new(HashMap::new()),
            doc_count: AtomicU64::new(0),
            length_sum: AtomicU64::new(0),
            total_posting_entries: AtomicU64::new(0),
            arena,
        }
    }

    fn shard_index(&self, handle: TermHandle) -> usize {
        handle.0 as usize % self.shards.len()
    }

    /// `add_document` (spec §4.2): requires the per-index exclusive lock to
    /// be held by the caller (not enforced here — `SharedIndexState::lock`
    /// is the caller's responsibility, matching "higher-level invariants
    /// ... are protected by the per-index lock" in spec §5).
    pub fn add_document(&self, doc_ref: DocRef, terms: &[TokenizedTerm], doc_length: i32) -> Result<usize> {
        let mut new_entries = 0usize;
        for t in terms {
            let handle = self.intern.insert_or_get(&t.term)?;
            self.arena.reserve(std::mem::size_of::<PostingEntry>())?;
            let added = {
                let idx = self.shard_index(handle);
                let mut shard = self.shards[idx].write();
                let list = shard.entry(handle).or_insert_with(PostingList::new);
                list.add(doc_ref, t.tf)
            };
            if added == 0 {
                // entry already existed; give the reservation back
                self.arena.release(std::mem::size_of::<PostingEntry>());
            } else {
                new_entries += 1;
            }
        }
        let prev_length = self.doc_lengths.write().insert(doc_ref, doc_length);
        match prev_length {
            None => {
                self.doc_count.fetch_add(1, Ordering::Relaxed);
                self.length_sum.fetch_add(doc_length.max(0) as u64, Ordering::Relaxed);
            }
            Some(prev) => {
                // doc_ref already tracked; N (invariant 4) must not double-count it.
                self.length_sum.fetch_sub(prev.max(0) as u64, Ordering::Relaxed);
                self.length_sum.fetch_add(doc_length.max(0) as u64, Ordering::Relaxed);
            }
        }
        self.total_posting_entries.fetch_add(new_entries as u64, Ordering::Relaxed);
        Ok(new_entries)
    }

    /// `search_term` (spec §4.2): returns a doc_ref-sorted snapshot. The
    /// memtable has no skip index, so the BMW scorer iterates it
    /// exhaustively (spec §4.8 "Memtable fallback").
    pub fn search_term(&self, term: &str) -> Option<Vec<PostingEntry>> {
        let handle = self.intern.lookup(term)?;
        let idx = self.shard_index(handle);
        let shard = self.shards[idx].read();
        shard.get(&handle).map(|pl| pl.sorted_entries())
    }

    pub fn doc_length(&self, doc_ref: DocRef) -> Option<i32> {
        self.doc_lengths.read().get(&doc_ref).copied()
    }

    pub fn stats(&self) -> MemtableStats {
        MemtableStats {
            doc_count: self.doc_count.load(Ordering::Relaxed),
            length_sum: self.length_sum.load(Ordering::Relaxed),
            total_posting_entries: self.total_posting_entries.load(Ordering::Relaxed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats().doc_count == 0
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.read().len()
    }

    pub fn avg_doc_length(&self) -> f32 {
        let stats = self.stats();
        if stats.doc_count == 0 { 0.0 } else { stats.length_sum as f32 / stats.doc_count as f32 }
    }

    /// All terms currently present, sorted — used by the segment writer to
    /// build a snapshot dictionary.
    pub fn terms_sorted(&self) -> Vec<Box<str>> {
        let mut terms: Vec<Box<str>> = self.intern.terms_snapshot().into_iter().map(|(t, _)| t).collect();
        terms.sort();
        terms
    }

    pub fn doc_refs_sorted(&self) -> Vec<DocRef> {
        let mut refs: Vec<DocRef> = self.doc_lengths.read().keys().copied().collect();
        refs.sort();
        refs
    }

    /// Runtime-mode clear: best-effort reclamation (spec §4.2). Build-mode
    /// clear is modeled one layer up by dropping this `Memtable` entirely
    /// and constructing a fresh one over a fresh `Arena` (see `build`).
    pub fn clear_runtime(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
        self.doc_lengths.write().clear();
        self.intern.clear();
        self.doc_count.store(0, Ordering::Relaxed);
        self.length_sum.store(0, Ordering::Relaxed);
        self.total_posting_entries.store(0, Ordering::Relaxed);
        self.arena.release(self.arena.used());
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(s: &str, tf: u32) -> TokenizedTerm {
        TokenizedTerm { term: s.to_string(), tf }
    }

    #[test]
    fn add_document_and_search() {
        let mt = Memtable::new(Arc::new(Arena::new(1 << 20)), 4);
        mt.add_document(DocRef(1), &[term("quick", 1), term("brown", 1)], 2).unwrap();
        mt.add_document(DocRef(2), &[term("brown", 1), term("dog", 1)], 2).unwrap();

        let brown = mt.search_term("brown").unwrap();
        assert_eq!(brown.len(), 2);
        assert_eq!(mt.doc_length(DocRef(1)), Some(2));
        assert_eq!(mt.search_term("missing"), None);

        let stats = mt.stats();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.length_sum, 4);
        assert_eq!(stats.total_posting_entries, 4); // quick, brown, brown, dog => 4 distinct (term,doc) pairs
    }

    #[test]
    fn repeated_insert_of_same_doc_sums_tf_without_new_entry() {
        let mt = Memtable::new(Arc::new(Arena::new(1 << 20)), 4);
        mt.add_document(DocRef(1), &[term("alpha", 2)], 2).unwrap();
        mt.add_document(DocRef(1), &[term("alpha", 3)], 2).unwrap();
        let postings = mt.search_term("alpha").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].tf, 5);
        assert_eq!(mt.stats().total_posting_entries, 1);
    }

    #[test]
    fn re_adding_a_doc_ref_does_not_inflate_doc_count_or_length_sum() {
        let mt = Memtable::new(Arc::new(Arena::new(1 << 20)), 4);
        mt.add_document(DocRef(1), &[term("alpha", 1)], 5).unwrap();
        mt.add_document(DocRef(1), &[term("beta", 1)], 9).unwrap();

        let stats = mt.stats();
        assert_eq!(stats.doc_count, 1, "doc_ref 1 was re-added, not a second document");
        assert_eq!(stats.doc_count as usize, mt.doc_count());
        assert_eq!(stats.length_sum, 9, "length_sum must reflect the latest doc_length, not both");
    }

    #[test]
    fn clear_runtime_empties_everything() {
        let mt = Memtable::new(Arc::new(Arena::new(1 << 20)), 4);
        mt.add_document(DocRef(1), &[term("alpha", 1)], 1).unwrap();
        mt.clear_runtime();
        assert!(mt.is_empty());
        assert_eq!(mt.search_term("alpha"), None);
        assert_eq!(mt.arena().used(), 0);
    }
}
