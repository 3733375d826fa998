//! Shared segment byte-assembly: turns a term-major postings snapshot into
//! the six concatenated sections, splits them into data pages, and writes
//! the root page. Used by both the memtable spill path (`writer`) and the
//! level compactor's merge path (`level::merge`), which differ only in
//! where the `TermBuild`s and field-norms come from.

use crate::core::error::Result;
use crate::core::types::{BlockNo, DocRef, NULL_BLOCK};
use crate::page::{PageStore, PAGE_SIZE};
use crate::segment::format::*;

pub struct TermBuild {
    pub term: String,
    /// `(doc_id, tf)`, sorted by `doc_id`.
    pub postings: Vec<(u32, u32)>,
}

const BLOCK_SIZE: usize = 128;

/// `doc_refs[doc_id]` and `fieldnorms[doc_id]` must be parallel, one entry
/// per segment-local doc id. `term_builds` must be sorted by term name.
pub fn assemble_and_write(
    store: &mut PageStore,
    level: u32,
    next_segment: BlockNo,
    doc_refs: &[DocRef],
    fieldnorms: &[u8],
    total_doc_length: u64,
    term_builds: &[TermBuild],
) -> Result<BlockNo> {
    let mut string_pool = Vec::new();
    let mut string_ranges = Vec::with_capacity(term_builds.len());
    for tb in term_builds {
        let offset = string_pool.len() as u32;
        string_pool.extend_from_slice(tb.term.as_bytes());
        string_ranges.push((offset, tb.term.len() as u32));
    }

    let mut postings_buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut dict_entries = Vec::with_capacity(term_builds.len());

    for (tb, (string_offset, string_len)) in term_builds.iter().zip(string_ranges.iter()) {
        let term_postings_offset = postings_buf.len() as u32;
        let term_skip_offset = skip_buf.len() as u32;
        let mut block_count: u16 = 0;

        for block in tb.postings.chunks(BLOCK_SIZE) {
            let block_posting_offset = postings_buf.len() as u32;
            let mut block_max_tf: u16 = 0;
            let mut block_min_quantized: u8 = u8::MAX;
            for &(doc_id, tf) in block {
                let entry = PostingEntryOnDisk { doc_id, frequency: tf as u16 };
                postings_buf.extend_from_slice(&entry.to_bytes());
                block_max_tf = block_max_tf.max(tf as u16);
                block_min_quantized = block_min_quantized.min(fieldnorms[doc_id as usize]);
            }
            let skip = SkipEntry {
                first_doc_id: block.first().unwrap().0,
                last_doc_id: block.last().unwrap().0,
                doc_count: block.len() as u16,
                block_max_tf,
                block_min_norm: block_min_quantized,
                posting_offset: block_posting_offset,
            };
            skip_buf.extend_from_slice(&skip.to_bytes());
            block_count += 1;
        }

        dict_entries.push(DictEntry {
            term_hash: term_hash32(&tb.term),
            string_offset: *string_offset,
            string_len: *string_len,
            posting_offset: term_postings_offset,
            skip_index_offset: term_skip_offset,
            block_count,
            doc_freq: tb.postings.len() as u32,
            reserved: 0,
        });
    }

    let mut dict_buf = Vec::with_capacity(dict_entries.len() * DICT_ENTRY_SIZE);
    for d in &dict_entries {
        dict_buf.extend_from_slice(&d.to_bytes());
    }

    let mut docrefs_buf = Vec::with_capacity(doc_refs.len() * DOC_REF_ENTRY_SIZE);
    for d in doc_refs {
        docrefs_buf.extend_from_slice(&d.0.to_le_bytes());
    }

    let strings_offset = 0u32;
    let strings_size = string_pool.len() as u32;
    let dict_offset = strings_offset + strings_size;
    let dict_size = dict_buf.len() as u32;
    let skip_offset = dict_offset + dict_size;
    let skip_size = skip_buf.len() as u32;
    let postings_offset = skip_offset + skip_size;
    let postings_size = postings_buf.len() as u32;
    let fieldnorms_offset = postings_offset + postings_size;
    let fieldnorms_size = fieldnorms.len() as u32;
    let docrefs_offset = fieldnorms_offset + fieldnorms_size;
    let docrefs_size = docrefs_buf.len() as u32;

    let mut data = Vec::with_capacity(docrefs_offset as usize + docrefs_size as usize);
    data.extend_from_slice(&string_pool);
    data.extend_from_slice(&dict_buf);
    data.extend_from_slice(&skip_buf);
    data.extend_from_slice(&postings_buf);
    data.extend_from_slice(fieldnorms);
    data.extend_from_slice(&docrefs_buf);

    let mut page_map = Vec::new();
    for chunk in data.chunks(PAGE_SIZE) {
        let blk = store.allocate_new()?;
        let mut page = [0u8; PAGE_SIZE];
        page[..chunk.len()].copy_from_slice(chunk);
        store.write(blk, &page)?;
        page_map.push(blk);
    }

    let header = SegmentHeader {
        magic: SEGMENT_MAGIC,
        version: SEGMENT_VERSION,
        num_terms: term_builds.len() as u32,
        num_docs: doc_refs.len() as u32,
        total_doc_length,
        strings_offset,
        strings_size,
        dict_offset,
        dict_size,
        skip_offset,
        skip_size,
        postings_offset,
        postings_size,
        fieldnorms_offset,
        fieldnorms_size,
        docrefs_offset,
        docrefs_size,
        next_segment,
        level,
        created_at_unix: chrono::Utc::now().timestamp(),
        data_pages: page_map.len() as u32,
        inline_page_map_count: 0,
        page_map_overflow: NULL_BLOCK,
    };

    write_root_page(store, header, &page_map)
}

fn write_root_page(store: &mut PageStore, mut header: SegmentHeader, page_map: &[BlockNo]) -> Result<BlockNo> {
    let root_blk = store.allocate_new()?;

    let inline_capacity = (PAGE_SIZE - SEGMENT_HEADER_SIZE) / 4;
    let inline_count = page_map.len().min(inline_capacity);
    header.inline_page_map_count = inline_count as u32;

    let overflow = &page_map[inline_count..];
    header.page_map_overflow = if overflow.is_empty() { NULL_BLOCK } else { store.allocate_new()? };

    let mut root = [0u8; PAGE_SIZE];
    let header_bytes = header.to_bytes();
    root[..header_bytes.len()].copy_from_slice(&header_bytes);
    let mut off = header_bytes.len();
    for &blk in &page_map[..inline_count] {
        root[off..off + 4].copy_from_slice(&blk.to_le_bytes());
        off += 4;
    }
    store.write(root_blk, &root)?;

    write_overflow_chain(store, header.page_map_overflow, overflow)?;
    Ok(root_blk)
}

fn write_overflow_chain(store: &mut PageStore, first: BlockNo, entries: &[BlockNo]) -> Result<()> {
    if first == NULL_BLOCK {
        return Ok(());
    }
    const NEXT_PTR_SIZE: usize = 4;
    let per_page = (PAGE_SIZE - NEXT_PTR_SIZE) / 4;
    let mut blk = first;
    let mut i = 0;
    loop {
        let chunk = &entries[i..(i + per_page).min(entries.len())];
        let remaining = entries.len() - i - chunk.len();
        let next_blk = if remaining > 0 { store.allocate_new()? } else { NULL_BLOCK };

        let mut page = [0u8; PAGE_SIZE];
        let mut off = 0;
        for &e in chunk {
            page[off..off + 4].copy_from_slice(&e.to_le_bytes());
            off += 4;
        }
        page[PAGE_SIZE - NEXT_PTR_SIZE..].copy_from_slice(&next_blk.to_le_bytes());
        store.write(blk, &page)?;

        i += chunk.len();
        if next_blk == NULL_BLOCK {
            break;
        }
        blk = next_blk;
    }
    Ok(())
}
