//! Block-Max WAND top-K evaluation.
//!
//! Each query term's deduplicated postings (already merged across the
//! memtable and segment chain by `datasource::DataSource`) are re-chunked
//! in-memory into fixed-size blocks sorted by `doc_ref`, each carrying a
//! `block_max_tf`/`block_min_norm` upper bound. Re-chunking rather than
//! reusing on-disk block boundaries is necessary because postings from
//! different segments (and the memtable) are merged and deduplicated before
//! any block bound is valid.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::types::DocRef;
use crate::datasource::{Candidate, DataSource};
use crate::scoring::bm25;

const BLOCK_SIZE: usize = 128;

struct Block {
    last_doc_index: usize, // index (in `entries`) one past the block's last entry
    max_score: f32,
}

struct TermCursor {
    idf: f32,
    entries: Vec<Candidate>,
    blocks: Vec<Block>,
    block_idx: usize,
    entry_idx: usize,
}

impl TermCursor {
    fn new(idf: f32, mut entries: Vec<Candidate>, avg_doc_length: f32, k1: f32, b: f32) -> Self {
        entries.sort_by_key(|c| c.doc_ref);
        let mut blocks = Vec::new();
        let mut start = 0;
        while start < entries.len() {
            let end = (start + BLOCK_SIZE).min(entries.len());
            let block = &entries[start..end];
            // idf(t) may be negative (glossary, spec §6.8 IDF note) for a
            // term occurring in more than half the corpus. term_score is
            // monotone increasing in tf and decreasing in doc_length when
            // idf >= 0, but both relations flip when idf < 0, so the corner
            // that maximizes the score flips too: (max_tf, min_norm) when
            // idf >= 0, (min_tf, max_norm) when idf < 0. Using the wrong
            // corner would make block_max_score an underestimate and could
            // prune a block that actually contains the true top-K answer.
            let max_tf = block.iter().map(|c| c.tf).max().unwrap_or(0);
            let min_tf = block.iter().map(|c| c.tf).min().unwrap_or(0);
            let min_norm = block.iter().map(|c| c.doc_length).min().unwrap_or(0);
            let max_norm = block.iter().map(|c| c.doc_length).max().unwrap_or(0);
            let max_score = if idf >= 0.0 {
                bm25::term_score(idf, max_tf, min_norm, avg_doc_length, k1, b)
            } else {
                bm25::term_score(idf, min_tf, max_norm, avg_doc_length, k1, b)
            };
            blocks.push(Block { last_doc_index: end, max_score });
            start = end;
        }
        TermCursor { idf, entries, blocks, block_idx: 0, entry_idx: 0 }
    }

    fn current(&self) -> Option<DocRef> {
        self.entries.get(self.entry_idx).map(|c| c.doc_ref)
    }

    fn current_candidate(&self) -> Option<Candidate> {
        self.entries.get(self.entry_idx).copied()
    }

    fn current_block_max(&self) -> f32 {
        self.blocks.get(self.block_idx).map(|b| b.max_score).unwrap_or(0.0)
    }

    fn advance_one(&mut self) {
        self.entry_idx += 1;
        self.sync_block();
    }

    /// Skips whole blocks until the current entry's doc_ref is `>= target`,
    /// without scoring the skipped entries.
    fn advance_to(&mut self, target: DocRef) {
        while self.block_idx < self.blocks.len() && self.entries[self.blocks[self.block_idx].last_doc_index - 1].doc_ref < target {
            self.entry_idx = self.blocks[self.block_idx].last_doc_index;
            self.block_idx += 1;
        }
        while self.entry_idx < self.entries.len() && self.entries[self.entry_idx].doc_ref < target {
            self.entry_idx += 1;
        }
    }

    fn skip_current_block(&mut self) {
        if self.block_idx < self.blocks.len() {
            self.entry_idx = self.blocks[self.block_idx].last_doc_index;
            self.block_idx += 1;
        }
    }

    fn sync_block(&mut self) {
        while self.block_idx < self.blocks.len() && self.entry_idx >= self.blocks[self.block_idx].last_doc_index {
            self.block_idx += 1;
        }
    }
}

#[derive(Clone, Copy)]
struct HeapItem {
    score: f32,
    doc_ref: DocRef,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.doc_ref == other.doc_ref
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordering such that `BinaryHeap::pop` removes the *worst* item: lowest
/// score first, and among equal scores the higher `doc_ref` first — so a
/// tie is broken in favor of keeping the lower `doc_ref` (invariant: ties
/// resolve to the lower `doc_ref`).
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.score.total_cmp(&other.score) {
            Ordering::Equal => self.doc_ref.cmp(&other.doc_ref),
            ord => ord.reverse(),
        }
    }
}

/// Runs BMW over `terms`, returning up to `limit` `(doc_ref, score)` pairs
/// ordered best-first, lower `doc_ref` breaking ties.
pub fn top_k(source: &mut DataSource, terms: &[String], limit: usize, k1: f32, b: f32) -> crate::core::error::Result<Vec<(DocRef, f32)>> {
    top_k_with_stats(source, terms, limit, k1, b).map(|(results, _)| results)
}

/// Same as [`top_k`] but also reports `docs_scored`: the number of full
/// BM25 score computations the pivot step performed. A LIMIT pushdown that
/// narrows the heap should strictly reduce this count relative to an
/// unbounded scan whenever block-max pruning has room to skip blocks.
pub fn top_k_with_stats(
    source: &mut DataSource,
    terms: &[String],
    limit: usize,
    k1: f32,
    b: f32,
) -> crate::core::error::Result<(Vec<(DocRef, f32)>, u64)> {
    if limit == 0 || terms.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let avg_doc_length = source.stats().avg_doc_length;
    let total_docs = source.total_docs();

    let mut cursors = Vec::with_capacity(terms.len());
    for term in terms {
        let entries = source.candidates_for(term)?;
        if entries.is_empty() {
            continue;
        }
        let idf = bm25::idf(total_docs, entries.len() as u32);
        cursors.push(TermCursor::new(idf, entries, avg_doc_length, k1, b));
    }
    if cursors.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::new();
    let mut docs_scored = 0u64;

    loop {
        let mut live: Vec<usize> = (0..cursors.len()).filter(|&i| cursors[i].current().is_some()).collect();
        if live.is_empty() {
            break;
        }
        live.sort_by_key(|&i| cursors[i].current().unwrap());

        let threshold = if heap.len() >= limit { heap.peek().unwrap().score } else { f32::NEG_INFINITY };

        let mut cumulative = 0.0f32;
        let mut pivot_pos = None;
        for (pos, &i) in live.iter().enumerate() {
            cumulative += cursors[i].current_block_max();
            if cumulative > threshold {
                pivot_pos = Some(pos);
                break;
            }
        }

        let Some(pivot_pos) = pivot_pos else {
            // No combination of current blocks can beat the threshold.
            // Skip every live term's current block entirely and retry.
            for &i in &live {
                cursors[i].skip_current_block();
            }
            continue;
        };

        let pivot_doc = cursors[live[pivot_pos]].current().unwrap();
        let smallest = live[0];

        if cursors[smallest].current().unwrap() == pivot_doc {
            docs_scored += 1;
            let mut score = 0.0f32;
            for &i in &live {
                match cursors[i].current() {
                    Some(d) if d == pivot_doc => {
                        let c = cursors[i].current_candidate().unwrap();
                        score += bm25::term_score(cursors[i].idf, c.tf, c.doc_length, avg_doc_length, k1, b);
                    }
                    _ => break, // `live` is sorted ascending; no more matches beyond here
                }
            }

            let item = HeapItem { score, doc_ref: pivot_doc };
            if heap.len() < limit {
                heap.push(item);
            } else if let Some(worst) = heap.peek().copied() {
                if item.cmp(&worst) == Ordering::Less {
                    heap.pop();
                    heap.push(item);
                }
            }

            for &i in &live {
                if cursors[i].current() == Some(pivot_doc) {
                    cursors[i].advance_one();
                } else {
                    break;
                }
            }
        } else {
            cursors[smallest].advance_to(pivot_doc);
        }
    }

    let mut results: Vec<(DocRef, f32)> = heap.into_iter().map(|h| (h.doc_ref, h.score)).collect();
    results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok((results, docs_scored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::arena::Arena;
    use crate::core::config::Config;
    use crate::core::types::{DocRef, TokenizedTerm};
    use crate::memtable::Memtable;
    use crate::metapage::MetaPage;
    use crate::page::PageStore;
    use std::sync::Arc;

    fn term(s: &str, tf: u32) -> TokenizedTerm {
        TokenizedTerm { term: s.to_string(), tf }
    }

    #[test]
    fn ranks_higher_term_frequency_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
        mt.add_document(DocRef(1), &[term("rust", 1)], 10).unwrap();
        mt.add_document(DocRef(2), &[term("rust", 5)], 10).unwrap();
        mt.add_document(DocRef(3), &[term("other", 1)], 10).unwrap();

        let meta = MetaPage::empty();
        let config = Config::default();
        let mut source = DataSource::open(&mut store, &mt, &meta, &config).unwrap();

        let results = top_k(&mut source, &["rust".to_string()], 10, 1.2, 0.75).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, DocRef(2));
        assert_eq!(results[1].0, DocRef(1));
    }

    #[test]
    fn limit_caps_result_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
        for i in 1..=20u64 {
            mt.add_document(DocRef(i), &[term("word", i as u32)], 10).unwrap();
        }
        let meta = MetaPage::empty();
        let config = Config::default();
        let mut source = DataSource::open(&mut store, &mt, &meta, &config).unwrap();

        let results = top_k(&mut source, &["word".to_string()], 5, 1.2, 0.75).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].0, DocRef(20));
    }

    #[test]
    fn tighter_limit_scores_no_more_documents_than_a_wide_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
        // A high-df term ("common") paired with a selective one ("rare")
        // gives block-max pruning something to skip once the heap fills.
        for i in 1..=200u64 {
            let mut terms = vec![term("common", 1)];
            if i == 1 {
                terms.push(term("rare", 50));
            }
            mt.add_document(DocRef(i), &terms, 5).unwrap();
        }
        let meta = MetaPage::empty();
        let config = Config::default();

        let mut wide = DataSource::open(&mut store, &mt, &meta, &config).unwrap();
        let (_, scored_wide) = top_k_with_stats(&mut wide, &["common".to_string(), "rare".to_string()], 200, 1.2, 0.75).unwrap();

        let mut narrow = DataSource::open(&mut store, &mt, &meta, &config).unwrap();
        let (_, scored_narrow) = top_k_with_stats(&mut narrow, &["common".to_string(), "rare".to_string()], 1, 1.2, 0.75).unwrap();

        assert!(scored_narrow < scored_wide, "narrow={scored_narrow} wide={scored_wide}");
    }
}
