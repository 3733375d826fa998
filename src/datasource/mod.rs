//! Uniform read view over the memtable and the segment chain, used by the
//! scorer so it never has to know which layer a posting came from.
//!
//! Freshness rule: a `doc_ref` currently present in the memtable is always
//! authoritative (it was added since the last spill), so any segment
//! posting for that `doc_ref` is discarded. Among segments, the newest
//! segment that mentions a `doc_ref` for a given term wins, mirroring the
//! level compactor's merge rule.

use std::collections::HashSet;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{DocRef, NULL_BLOCK};
use crate::memtable::Memtable;
use crate::metapage::MetaPage;
use crate::page::PageStore;
use crate::segment::format::dequantize_norm;
use crate::segment::reader::SegmentReader;

/// One deduplicated posting as seen from the query's point of view:
/// term frequency plus the document's (possibly quantized) length.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub doc_ref: DocRef,
    pub tf: u32,
    pub doc_length: u32,
}

pub struct CorpusStatsView {
    pub total_docs: u64,
    pub avg_doc_length: f32,
}

pub struct DataSource<'a> {
    memtable: &'a Memtable,
    store: &'a mut PageStore,
    /// Segment roots across all levels, newest first within a level,
    /// level 0 first.
    segment_roots: Vec<crate::core::types::BlockNo>,
    stats: CorpusStatsView,
}

impl<'a> DataSource<'a> {
    pub fn open(store: &'a mut PageStore, memtable: &'a Memtable, meta: &MetaPage, config: &Config) -> Result<Self> {
        let mut segment_roots = Vec::new();
        for level in 0..config.max_levels {
            let mut blk = meta.level_heads[level];
            while blk != NULL_BLOCK {
                segment_roots.push(blk);
                let reader = SegmentReader::open(store, blk)?;
                blk = reader.next_segment();
            }
        }

        let mt_stats = memtable.stats();
        let total_docs = meta.total_docs + mt_stats.doc_count;
        let total_len = meta.total_len + mt_stats.length_sum;
        let avg_doc_length = if total_docs == 0 { 0.0 } else { total_len as f32 / total_docs as f32 };

        Ok(DataSource { memtable, store, segment_roots, stats: CorpusStatsView { total_docs, avg_doc_length } })
    }

    pub fn stats(&self) -> &CorpusStatsView {
        &self.stats
    }

    pub fn total_docs(&self) -> u64 {
        self.stats.total_docs
    }

    /// The corpus-wide document frequency of `term`, used for idf. This
    /// counts every live posting returned by `candidates_for`.
    pub fn doc_freq(&mut self, term: &str) -> Result<u32> {
        Ok(self.candidates_for(term)?.len() as u32)
    }

    /// All live postings for `term`, deduplicated per the freshness rule,
    /// sorted by `doc_ref`.
    pub fn candidates_for(&mut self, term: &str) -> Result<Vec<Candidate>> {
        let mut seen: HashSet<DocRef> = HashSet::new();
        let mut out = Vec::new();

        if let Some(entries) = self.memtable.search_term(term) {
            for e in entries {
                let len = self.memtable.doc_length(e.doc_ref).unwrap_or(0).max(0) as u32;
                out.push(Candidate { doc_ref: e.doc_ref, tf: e.tf, doc_length: len });
                seen.insert(e.doc_ref);
            }
        }

        for &root in &self.segment_roots {
            let reader = SegmentReader::open(self.store, root)?;
            let Some(dict) = reader.lookup_term(self.store, term)? else { continue };
            for skip in reader.skip_entries(self.store, &dict)? {
                for p in reader.postings_in_block(self.store, &skip)? {
                    let dref = reader.doc_ref_at(self.store, p.doc_id)?;
                    if self.memtable.doc_length(dref).is_some() || !seen.insert(dref) {
                        continue;
                    }
                    let norm = dequantize_norm(reader.field_norm_byte(self.store, p.doc_id)?);
                    out.push(Candidate { doc_ref: dref, tf: p.frequency as u32, doc_length: norm });
                }
            }
        }

        out.sort_by_key(|c| c.doc_ref);
        Ok(out)
    }

    pub fn doc_length(&mut self, doc_ref: DocRef) -> Result<Option<u32>> {
        if let Some(l) = self.memtable.doc_length(doc_ref) {
            return Ok(Some(l.max(0) as u32));
        }
        for &root in &self.segment_roots {
            let reader = SegmentReader::open(self.store, root)?;
            for doc_id in 0..reader.num_docs() {
                if reader.doc_ref_at(self.store, doc_id)? == doc_ref {
                    return Ok(Some(reader.field_norm(self.store, doc_id)?));
                }
            }
        }
        Ok(None)
    }
}
