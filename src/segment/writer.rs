//! Segment spill: snapshots a memtable into an immutable, page-backed
//! segment (root page + page-map-addressed data pages).

use std::collections::HashMap;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::BlockNo;
use crate::memtable::Memtable;
use crate::page::PageStore;
use crate::segment::assemble::{assemble_and_write, TermBuild};
use crate::segment::format::quantize_norm;

/// Writes `memtable`'s current contents as one new segment at `level`,
/// returning the segment's root block number. The memtable is not mutated;
/// the caller clears it after the write is durable.
pub fn write_segment(
    store: &mut PageStore,
    memtable: &Memtable,
    level: u32,
    next_segment: BlockNo,
    _config: &Config,
) -> Result<BlockNo> {
    let doc_refs = memtable.doc_refs_sorted();
    let mut doc_id_of = HashMap::with_capacity(doc_refs.len());
    for (i, d) in doc_refs.iter().enumerate() {
        doc_id_of.insert(*d, i as u32);
    }

    let terms = memtable.terms_sorted();
    let mut term_builds = Vec::with_capacity(terms.len());
    for term in &terms {
        let entries = memtable.search_term(term).unwrap_or_default();
        let mut postings: Vec<(u32, u32)> =
            entries.iter().map(|e| (doc_id_of[&e.doc_ref], e.tf.min(u16::MAX as u32))).collect();
        postings.sort_by_key(|(doc_id, _)| *doc_id);
        term_builds.push(TermBuild { term: term.to_string(), postings });
    }

    let mut fieldnorms = vec![0u8; doc_refs.len()];
    let mut total_doc_length = 0u64;
    for (doc_id, doc_ref) in doc_refs.iter().enumerate() {
        let len = memtable.doc_length(*doc_ref).unwrap_or(0).max(0) as u32;
        fieldnorms[doc_id] = quantize_norm(len);
        total_doc_length += len as u64;
    }

    assemble_and_write(store, level, next_segment, &doc_refs, &fieldnorms, total_doc_length, &term_builds)
}
