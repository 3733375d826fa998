//! Block-0 metapage: the durable root of one index — corpus statistics,
//! the LSM level heads, and the docid recovery-log anchor.

use crate::core::error::{Error, Result};
use crate::core::types::{BlockNo, NULL_BLOCK};
use crate::page::{PageStore, PAGE_SIZE};

pub const METAPAGE_MAGIC: u32 = 0x5450_494D; // "TPIM"
pub const METAPAGE_VERSION: u32 = 4;
pub const METAPAGE_BLOCK: BlockNo = 0;

pub const MAX_LEVELS: usize = 16;

#[derive(Debug, Clone)]
pub struct MetaPage {
    pub total_docs: u64,
    pub total_len: u64,
    pub sum_idf: f64,
    /// Per level, the root block of the newest segment (a singly-linked
    /// chain via each segment's `next_segment` field), or `NULL_BLOCK`.
    pub level_heads: [BlockNo; MAX_LEVELS],
    pub level_counts: [u16; MAX_LEVELS],
    pub docid_log_anchor: BlockNo,
}

impl MetaPage {
    pub fn empty() -> Self {
        MetaPage {
            total_docs: 0,
            total_len: 0,
            sum_idf: 0.0,
            level_heads: [NULL_BLOCK; MAX_LEVELS],
            level_counts: [0; MAX_LEVELS],
            docid_log_anchor: NULL_BLOCK,
        }
    }

    pub fn read(store: &mut PageStore) -> Result<Self> {
        let page = store.read(METAPAGE_BLOCK)?;
        let magic = u32::from_le_bytes(page[0..4].try_into().unwrap());
        let version = u32::from_le_bytes(page[4..8].try_into().unwrap());
        if magic != METAPAGE_MAGIC {
            return Err(Error::corrupt(format!("metapage magic mismatch: {magic:#x}")));
        }
        if version != METAPAGE_VERSION {
            return Err(Error::corrupt(format!("metapage version mismatch: {version}")));
        }
        let total_docs = u64::from_le_bytes(page[8..16].try_into().unwrap());
        let total_len = u64::from_le_bytes(page[16..24].try_into().unwrap());
        let sum_idf = f64::from_le_bytes(page[24..32].try_into().unwrap());

        let mut level_heads = [NULL_BLOCK; MAX_LEVELS];
        let mut off = 32;
        for head in &mut level_heads {
            *head = u32::from_le_bytes(page[off..off + 4].try_into().unwrap());
            off += 4;
        }
        let mut level_counts = [0u16; MAX_LEVELS];
        for count in &mut level_counts {
            *count = u16::from_le_bytes(page[off..off + 2].try_into().unwrap());
            off += 2;
        }
        let docid_log_anchor = u32::from_le_bytes(page[off..off + 4].try_into().unwrap());

        Ok(MetaPage { total_docs, total_len, sum_idf, level_heads, level_counts, docid_log_anchor })
    }

    /// Writes and flushes the metapage. Callers update in-memory state first
    /// and only call this once a segment (or the docid log append) is
    /// already durable, so the metapage is never dirty relative to what it
    /// points to.
    pub fn write(&self, store: &mut PageStore) -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&METAPAGE_MAGIC.to_le_bytes());
        page[4..8].copy_from_slice(&METAPAGE_VERSION.to_le_bytes());
        page[8..16].copy_from_slice(&self.total_docs.to_le_bytes());
        page[16..24].copy_from_slice(&self.total_len.to_le_bytes());
        page[24..32].copy_from_slice(&self.sum_idf.to_le_bytes());
        let mut off = 32;
        for &head in &self.level_heads {
            page[off..off + 4].copy_from_slice(&head.to_le_bytes());
            off += 4;
        }
        for &count in &self.level_counts {
            page[off..off + 2].copy_from_slice(&count.to_le_bytes());
            off += 2;
        }
        page[off..off + 4].copy_from_slice(&self.docid_log_anchor.to_le_bytes());
        store.write(METAPAGE_BLOCK, &page)?;
        store.flush(METAPAGE_BLOCK)
    }

    pub fn avg_doc_length(&self) -> f32 {
        if self.total_docs == 0 { 0.0 } else { self.total_len as f32 / self.total_docs as f32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metapage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut mp = MetaPage::empty();
        mp.total_docs = 42;
        mp.total_len = 1000;
        mp.sum_idf = 12.5;
        mp.level_heads[0] = 7;
        mp.level_counts[0] = 3;
        mp.docid_log_anchor = 9;
        mp.write(&mut store).unwrap();

        let back = MetaPage::read(&mut store).unwrap();
        assert_eq!(back.total_docs, 42);
        assert_eq!(back.level_heads[0], 7);
        assert_eq!(back.level_counts[0], 3);
        assert_eq!(back.docid_log_anchor, 9);
    }
}
