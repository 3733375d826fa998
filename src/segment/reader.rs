//! Read path over an immutable segment: root-page header/page-map parsing,
//! binary-search dictionary lookup, and block-bounded posting iteration.

use crate::core::error::{Error, Result};
use crate::core::types::{BlockNo, DocRef, NULL_BLOCK};
use crate::page::{PageStore, PAGE_SIZE};
use crate::segment::format::*;

pub struct SegmentReader {
    root_blk: BlockNo,
    header: SegmentHeader,
    page_map: Vec<BlockNo>,
}

impl SegmentReader {
    pub fn open(store: &mut PageStore, root_blk: BlockNo) -> Result<Self> {
        let root = store.read(root_blk)?;
        let header = SegmentHeader::from_bytes(&root)?;

        let header_size = SEGMENT_HEADER_SIZE;
        let mut page_map = Vec::with_capacity(header.data_pages as usize);
        let mut off = header_size;
        for _ in 0..header.inline_page_map_count {
            let blk = u32::from_le_bytes(root[off..off + 4].try_into().unwrap());
            page_map.push(blk);
            off += 4;
        }

        let mut next = header.page_map_overflow;
        while next != NULL_BLOCK {
            let page = store.read(next)?;
            const NEXT_PTR_SIZE: usize = 4;
            let per_page = (PAGE_SIZE - NEXT_PTR_SIZE) / 4;
            let remaining = header.data_pages as usize - page_map.len();
            let take = remaining.min(per_page);
            let mut off = 0;
            for _ in 0..take {
                let blk = u32::from_le_bytes(page[off..off + 4].try_into().unwrap());
                page_map.push(blk);
                off += 4;
            }
            next = u32::from_le_bytes(page[PAGE_SIZE - NEXT_PTR_SIZE..].try_into().unwrap());
        }

        if page_map.len() != header.data_pages as usize {
            return Err(Error::corrupt(format!(
                "segment {root_blk} page map has {} entries, header declares {}",
                page_map.len(),
                header.data_pages
            )));
        }

        Ok(SegmentReader { root_blk, header, page_map })
    }

    pub fn root_block(&self) -> BlockNo {
        self.root_blk
    }

    pub fn num_docs(&self) -> u32 {
        self.header.num_docs
    }

    pub fn num_terms(&self) -> u32 {
        self.header.num_terms
    }

    pub fn total_doc_length(&self) -> u64 {
        self.header.total_doc_length
    }

    pub fn level(&self) -> u32 {
        self.header.level
    }

    pub fn next_segment(&self) -> BlockNo {
        self.header.next_segment
    }

    /// Reads a logical byte range out of the data pages, decomposing it into
    /// page-bounded copies via the page-map.
    fn read_range(&self, store: &mut PageStore, offset: u32, len: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len as usize);
        let mut remaining = len as usize;
        let mut pos = offset as usize;
        while remaining > 0 {
            let page_idx = pos / PAGE_SIZE;
            let within = pos % PAGE_SIZE;
            let blk = *self
                .page_map
                .get(page_idx)
                .ok_or_else(|| Error::corrupt(format!("segment {} logical offset {} out of range", self.root_blk, pos)))?;
            let page = store.read(blk)?;
            let take = (PAGE_SIZE - within).min(remaining);
            out.extend_from_slice(&page[within..within + take]);
            pos += take;
            remaining -= take;
        }
        Ok(out)
    }

    fn dict_entry_at(&self, store: &mut PageStore, idx: u32) -> Result<DictEntry> {
        let bytes = self.read_range(store, self.header.dict_offset + idx * DICT_ENTRY_SIZE as u32, DICT_ENTRY_SIZE as u32)?;
        Ok(DictEntry::from_bytes(&bytes))
    }

    fn term_string(&self, store: &mut PageStore, entry: &DictEntry) -> Result<String> {
        let bytes = self.read_range(store, self.header.strings_offset + entry.string_offset, entry.string_len)?;
        String::from_utf8(bytes).map_err(|_| Error::corrupt("non-utf8 term in string pool"))
    }

    /// Binary search over the sorted dictionary by term bytes, with the
    /// 32-bit hash used only as a cheap pre-filter on equality checks.
    pub fn lookup_term(&self, store: &mut PageStore, term: &str) -> Result<Option<DictEntry>> {
        let hash = term_hash32(term);
        let mut lo = 0i64;
        let mut hi = self.header.num_terms as i64 - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let entry = self.dict_entry_at(store, mid as u32)?;
            let mid_term = self.term_string(store, &entry)?;
            match mid_term.as_str().cmp(term) {
                std::cmp::Ordering::Equal => {
                    debug_assert_eq!(entry.term_hash, hash);
                    return Ok(Some(entry));
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid - 1,
            }
        }
        Ok(None)
    }

    /// All terms in dictionary order (already sorted). Used by the level
    /// compactor's k-way merge, not the query path.
    pub fn all_terms(&self, store: &mut PageStore) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(self.header.num_terms as usize);
        for i in 0..self.header.num_terms {
            let entry = self.dict_entry_at(store, i)?;
            out.push(self.term_string(store, &entry)?);
        }
        Ok(out)
    }

    pub fn skip_entries(&self, store: &mut PageStore, entry: &DictEntry) -> Result<Vec<SkipEntry>> {
        let mut out = Vec::with_capacity(entry.block_count as usize);
        let mut offset = self.header.skip_offset + entry.skip_index_offset;
        for _ in 0..entry.block_count {
            let bytes = self.read_range(store, offset, SKIP_ENTRY_SIZE as u32)?;
            out.push(SkipEntry::from_bytes(&bytes));
            offset += SKIP_ENTRY_SIZE as u32;
        }
        Ok(out)
    }

    pub fn postings_in_block(&self, store: &mut PageStore, skip: &SkipEntry) -> Result<Vec<PostingEntryOnDisk>> {
        let count = skip.doc_count as usize;
        let bytes = self.read_range(
            store,
            self.header.postings_offset + skip.posting_offset,
            (count * POSTING_ENTRY_SIZE) as u32,
        )?;
        Ok(bytes.chunks(POSTING_ENTRY_SIZE).map(PostingEntryOnDisk::from_bytes).collect())
    }

    pub fn field_norm_byte(&self, store: &mut PageStore, doc_id: u32) -> Result<u8> {
        let bytes = self.read_range(store, self.header.fieldnorms_offset + doc_id, 1)?;
        Ok(bytes[0])
    }

    pub fn field_norm(&self, store: &mut PageStore, doc_id: u32) -> Result<u32> {
        Ok(dequantize_norm(self.field_norm_byte(store, doc_id)?))
    }

    pub fn doc_ref_at(&self, store: &mut PageStore, doc_id: u32) -> Result<DocRef> {
        let bytes = self.read_range(store, self.header.docrefs_offset + doc_id * DOC_REF_ENTRY_SIZE as u32, DOC_REF_ENTRY_SIZE as u32)?;
        Ok(DocRef(u64::from_le_bytes(bytes.try_into().unwrap())))
    }

    /// Sanity pass over section bounds and dictionary ordering, used after a
    /// spill or merge and before a segment is made visible.
    pub fn verify(&self, store: &mut PageStore) -> Result<()> {
        let total_data_len = self.page_map.len() as u64 * PAGE_SIZE as u64;
        let end = self.header.docrefs_offset as u64 + self.header.docrefs_size as u64;
        if end > total_data_len {
            return Err(Error::corrupt(format!("segment {} sections overrun data pages", self.root_blk)));
        }
        let mut prev: Option<String> = None;
        for i in 0..self.header.num_terms {
            let entry = self.dict_entry_at(store, i)?;
            let term = self.term_string(store, &entry)?;
            if let Some(p) = &prev {
                if term.as_str() <= p.as_str() {
                    return Err(Error::corrupt(format!("segment {} dictionary not strictly sorted at entry {i}", self.root_blk)));
                }
            }
            prev = Some(term);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::arena::Arena;
    use crate::core::config::Config;
    use crate::core::types::TokenizedTerm;
    use crate::memtable::Memtable;
    use crate::segment::writer::write_segment;
    use std::sync::Arc;

    fn term(s: &str, tf: u32) -> TokenizedTerm {
        TokenizedTerm { term: s.to_string(), tf }
    }

    #[test]
    fn lookup_and_block_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
        for i in 0..5u64 {
            mt.add_document(DocRef(i), &[term("alpha", 1), term("beta", (i + 1) as u32)], 10).unwrap();
        }
        let root = write_segment(&mut store, &mt, 0, NULL_BLOCK, &Config::default()).unwrap();
        let reader = SegmentReader::open(&mut store, root).unwrap();
        reader.verify(&mut store).unwrap();

        let alpha = reader.lookup_term(&mut store, "alpha").unwrap().unwrap();
        assert_eq!(alpha.doc_freq, 5);
        let skips = reader.skip_entries(&mut store, &alpha).unwrap();
        assert_eq!(skips.len(), 1);
        let postings = reader.postings_in_block(&mut store, &skips[0]).unwrap();
        assert_eq!(postings.len(), 5);

        assert!(reader.lookup_term(&mut store, "missing").unwrap().is_none());
    }
}
