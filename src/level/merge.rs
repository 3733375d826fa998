//! K-way streaming merge of a level's segments into one segment at the
//! next level, with youngest-wins conflict resolution on duplicate
//! `(term, doc_ref)` pairs arising from re-added (updated) documents.

use std::collections::{BTreeMap, HashMap};

use crate::core::error::Result;
use crate::core::types::{BlockNo, DocRef};
use crate::page::PageStore;
use crate::segment::assemble::{assemble_and_write, TermBuild};
use crate::segment::format::dequantize_norm;
use crate::segment::reader::SegmentReader;

/// `roots` must be ordered newest-first: a `doc_ref` present in more than
/// one segment resolves to the entry in the first (youngest) segment that
/// contains it, and every other segment's postings for that `doc_ref` are
/// dropped.
pub fn merge_segments(store: &mut PageStore, roots: &[BlockNo], target_level: u32, next_segment: BlockNo) -> Result<BlockNo> {
    let readers: Vec<SegmentReader> =
        roots.iter().map(|&r| SegmentReader::open(store, r)).collect::<Result<_>>()?;

    // Pass 1: decide, for every doc_ref across all segments, which segment
    // (and local doc_id within it) is authoritative.
    let mut winners: HashMap<DocRef, (usize, u32)> = HashMap::new();
    for (seg_idx, reader) in readers.iter().enumerate() {
        for doc_id in 0..reader.num_docs() {
            let dref = reader.doc_ref_at(store, doc_id)?;
            winners.entry(dref).or_insert((seg_idx, doc_id));
        }
    }

    let mut doc_refs: Vec<DocRef> = winners.keys().copied().collect();
    doc_refs.sort();
    let merged_doc_id: HashMap<DocRef, u32> = doc_refs.iter().enumerate().map(|(i, d)| (*d, i as u32)).collect();

    let mut fieldnorms = vec![0u8; doc_refs.len()];
    let mut total_doc_length = 0u64;
    for (merged_id, dref) in doc_refs.iter().enumerate() {
        let (seg_idx, doc_id) = winners[dref];
        let byte = readers[seg_idx].field_norm_byte(store, doc_id)?;
        fieldnorms[merged_id] = byte;
        total_doc_length += dequantize_norm(byte) as u64;
    }

    // Pass 2: k-way merge dictionaries by term name, dropping postings that
    // belong to a doc_ref some other (winning) segment already claimed.
    let mut term_segs: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (seg_idx, reader) in readers.iter().enumerate() {
        for term in reader.all_terms(store)? {
            term_segs.entry(term).or_default().push(seg_idx);
        }
    }

    let mut term_builds = Vec::with_capacity(term_segs.len());
    for (term, segs) in term_segs {
        let mut postings: Vec<(u32, u32)> = Vec::new();
        for seg_idx in segs {
            let reader = &readers[seg_idx];
            let dict = reader.lookup_term(store, &term)?.expect("term came from this segment's own dictionary");
            for skip in reader.skip_entries(store, &dict)? {
                for p in reader.postings_in_block(store, &skip)? {
                    let dref = reader.doc_ref_at(store, p.doc_id)?;
                    if winners.get(&dref) == Some(&(seg_idx, p.doc_id)) {
                        postings.push((merged_doc_id[&dref], p.frequency as u32));
                    }
                }
            }
        }
        if !postings.is_empty() {
            postings.sort_by_key(|(id, _)| *id);
            term_builds.push(TermBuild { term, postings });
        }
    }

    assemble_and_write(store, target_level, next_segment, &doc_refs, &fieldnorms, total_doc_length, &term_builds)
}
