//! Docid recovery log (spec §3 "Docid page", §4.3).
//!
//! An append-only chain of pages recording the external doc-ref of every
//! document added to the memtable since the last successful spill. Anchored
//! by `first_docid_page` in the metapage; replaying it followed by
//! tokenize -> add_document rebuilds the memtable after a crash (invariant 7).

use crate::core::error::{Error, Result};
use crate::core::types::{BlockNo, DocRef, NULL_BLOCK};
use crate::page::{PageStore, PAGE_SIZE};

pub const DOCID_PAGE_MAGIC: u32 = 0x5450_4944; // "TPID"
pub const DOCID_PAGE_VERSION: u32 = 1;

const HEADER_SIZE: usize = 4 + 4 + 4 + 4; // magic, version, num_docids, next_page
const ENTRY_SIZE: usize = 6; // packed 48-bit doc_ref, 2-byte aligned
const ENTRIES_PER_PAGE: usize = (PAGE_SIZE - HEADER_SIZE) / ENTRY_SIZE;

struct DocidPageHeader {
    magic: u32,
    version: u32,
    num_docids: u32,
    next_page: BlockNo,
}

impl DocidPageHeader {
    fn empty() -> Self {
        DocidPageHeader { magic: DOCID_PAGE_MAGIC, version: DOCID_PAGE_VERSION, num_docids: 0, next_page: NULL_BLOCK }
    }

    fn read(page: &[u8; PAGE_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes(page[0..4].try_into().unwrap());
        let version = u32::from_le_bytes(page[4..8].try_into().unwrap());
        if magic != DOCID_PAGE_MAGIC {
            return Err(Error::corrupt(format!("docid page magic mismatch: {magic:#x}")));
        }
        if version != DOCID_PAGE_VERSION {
            return Err(Error::corrupt(format!("docid page version mismatch: {version}")));
        }
        let num_docids = u32::from_le_bytes(page[8..12].try_into().unwrap());
        let next_page = u32::from_le_bytes(page[12..16].try_into().unwrap());
        Ok(DocidPageHeader { magic, version, num_docids, next_page })
    }

    fn write(&self, page: &mut [u8; PAGE_SIZE]) {
        page[0..4].copy_from_slice(&self.magic.to_le_bytes());
        page[4..8].copy_from_slice(&self.version.to_le_bytes());
        page[8..12].copy_from_slice(&self.num_docids.to_le_bytes());
        page[12..16].copy_from_slice(&self.next_page.to_le_bytes());
    }
}

fn write_doc_ref(page: &mut [u8; PAGE_SIZE], slot: usize, doc_ref: DocRef) {
    let off = HEADER_SIZE + slot * ENTRY_SIZE;
    let bytes = doc_ref.0.to_le_bytes();
    page[off..off + ENTRY_SIZE].copy_from_slice(&bytes[0..ENTRY_SIZE]);
}

fn read_doc_ref(page: &[u8; PAGE_SIZE], slot: usize) -> DocRef {
    let off = HEADER_SIZE + slot * ENTRY_SIZE;
    let mut buf = [0u8; 8];
    buf[0..ENTRY_SIZE].copy_from_slice(&page[off..off + ENTRY_SIZE]);
    DocRef(u64::from_le_bytes(buf))
}

/// Backend-local cache avoiding an O(n) chain walk on every append (spec
/// §4.3). Invalidated at build start and whenever the log is cleared.
#[derive(Debug, Clone, Copy)]
struct TailCache {
    tail_page: BlockNo,
    tail_count: u32,
}

pub struct DocidLog {
    cache: Option<TailCache>,
}

impl DocidLog {
    pub fn new() -> Self {
        DocidLog { cache: None }
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Appends one doc-ref to the chain anchored at `*anchor`, allocating a
    /// new tail page when the current one is full.
    pub fn append(&mut self, store: &mut PageStore, anchor: &mut BlockNo, doc_ref: DocRef) -> Result<()> {
        let cache = match self.cache {
            Some(c) => c,
            None => self.rebuild_cache(store, *anchor)?,
        };

        if cache.tail_count as usize >= ENTRIES_PER_PAGE {
            // tail is full: allocate a new page, link it in, and point the
            // anchor or the previous tail's next_page at it.
            let new_blk = store.allocate_new()?;
            let mut new_page = [0u8; PAGE_SIZE];
            let mut header = DocidPageHeader::empty();
            write_doc_ref(&mut new_page, 0, doc_ref);
            header.num_docids = 1;
            header.write(&mut new_page);
            store.write(new_blk, &new_page)?;

            if *anchor == NULL_BLOCK {
                *anchor = new_blk;
            } else {
                let mut old_tail = store.read(cache.tail_page)?;
                let mut old_header = DocidPageHeader::read(&old_tail)?;
                old_header.next_page = new_blk;
                old_header.write(&mut old_tail);
                store.write(cache.tail_page, &old_tail)?;
            }
            self.cache = Some(TailCache { tail_page: new_blk, tail_count: 1 });
            return Ok(());
        }

        let mut page = store.read(cache.tail_page)?;
        let mut header = DocidPageHeader::read(&page)?;
        write_doc_ref(&mut page, header.num_docids as usize, doc_ref);
        header.num_docids += 1;
        header.write(&mut page);
        store.write(cache.tail_page, &page)?;
        self.cache = Some(TailCache { tail_page: cache.tail_page, tail_count: header.num_docids });
        Ok(())
    }

    fn rebuild_cache(&mut self, store: &mut PageStore, anchor: BlockNo) -> Result<TailCache> {
        if anchor == NULL_BLOCK {
            let cache = TailCache { tail_page: NULL_BLOCK, tail_count: u32::MAX }; // forces allocation on next append
            return Ok(cache);
        }
        let mut blk = anchor;
        loop {
            let page = store.read(blk)?;
            let header = DocidPageHeader::read(&page)?;
            if header.next_page == NULL_BLOCK {
                let cache = TailCache { tail_page: blk, tail_count: header.num_docids };
                return Ok(cache);
            }
            blk = header.next_page;
        }
    }

    /// Resets the anchor to null and invalidates the cache (spec §4.3).
    /// Pages are not physically deleted; they become garbage.
    pub fn clear_after_spill(&mut self, anchor: &mut BlockNo) {
        *anchor = NULL_BLOCK;
        self.cache = None;
    }

    /// Walks the chain from `anchor`, invoking `callback(doc_ref)` for every
    /// entry. Stops (without erroring) on a corrupt `next_page` pointer,
    /// matching the "log warning, return partial results" policy (spec §4).
    pub fn replay(store: &mut PageStore, anchor: BlockNo, mut callback: impl FnMut(DocRef)) -> Result<()> {
        let mut blk = anchor;
        let mut seen = std::collections::HashSet::new();
        while blk != NULL_BLOCK {
            if !seen.insert(blk) {
                log::warn!("docid log chain cycle detected at block {blk}, stopping replay");
                break;
            }
            let page = match store.read(blk) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("docid log page {blk} unreadable: {e}");
                    break;
                }
            };
            let header = match DocidPageHeader::read(&page) {
                Ok(h) => h,
                Err(e) => {
                    log::warn!("docid log page {blk} corrupt: {e}");
                    break;
                }
            };
            for slot in 0..header.num_docids as usize {
                callback(read_doc_ref(&page, slot));
            }
            blk = header.next_page;
        }
        Ok(())
    }
}

impl Default for DocidLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut anchor = NULL_BLOCK;
        let mut log = DocidLog::new();

        for i in 1..=10u64 {
            log.append(&mut store, &mut anchor, DocRef(i)).unwrap();
        }

        let mut replayed = Vec::new();
        DocidLog::replay(&mut store, anchor, |d| replayed.push(d.0)).unwrap();
        assert_eq!(replayed, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn overflow_allocates_new_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut anchor = NULL_BLOCK;
        let mut log = DocidLog::new();

        for i in 0..(ENTRIES_PER_PAGE as u64 + 5) {
            log.append(&mut store, &mut anchor, DocRef(i)).unwrap();
        }

        let mut count = 0;
        DocidLog::replay(&mut store, anchor, |_| count += 1).unwrap();
        assert_eq!(count, ENTRIES_PER_PAGE + 5);
    }

    #[test]
    fn clear_after_spill_resets_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut anchor = NULL_BLOCK;
        let mut log = DocidLog::new();
        log.append(&mut store, &mut anchor, DocRef(1)).unwrap();
        log.clear_after_spill(&mut anchor);
        assert_eq!(anchor, NULL_BLOCK);
    }
}
