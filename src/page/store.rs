//! Page I/O adapter (spec §2, "Page I/O adapter").
//!
//! The real access method delegates this to the host's buffer manager
//! (`read page P of relation R, pin it, lock S/X, release`). Standing in for
//! that here is a flat paged file, memory-mapped for zero-copy reads and
//! in-place writes the way the teacher's `mmap::MmapFile` maps a segment
//! file: fixed-size pages, block 0 reserved for the metapage, `allocate_new`
//! grows the file and remaps it, `flush` msyncs. Locking is left to the
//! caller (the per-index `RwLock` in `concurrency::lock`) — this type only
//! does bytes-on-disk.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{BlockNo, NULL_BLOCK};

pub const PAGE_SIZE: usize = 8192;

/// Maps `num_pages` worth of `file` read-write, retrying once on a
/// transient OS failure before surfacing `ErrorKind::TransientIO` (spec
/// §7's only named retry policy).
///
/// Safety: the page file is exclusively owned by its `PageStore` (access is
/// further serialized by the caller's per-index lock), so no other process
/// or mapping can race these writes.
fn map_with_retry(file: &File, num_pages: BlockNo) -> Result<MmapMut> {
    let attempt = || unsafe { MmapOptions::new().len(num_pages as usize * PAGE_SIZE).map_mut(file) };
    match attempt() {
        Ok(mmap) => Ok(mmap),
        Err(first) => {
            log::warn!("transient page-store mmap failure, retrying once: {first}");
            attempt().map_err(|second| Error::new(ErrorKind::TransientIO, format!("page-store mmap failed twice: {second}")))
        }
    }
}

pub struct PageStore {
    file: File,
    mmap: MmapMut,
    num_pages: BlockNo,
}

impl PageStore {
    /// Opens (creating if needed) a page store backed by `path`. If the file
    /// is empty, block 0 is allocated as the reserved metapage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        let mut num_pages = (len / PAGE_SIZE as u64) as BlockNo;
        if num_pages == 0 {
            file.set_len(PAGE_SIZE as u64)?;
            num_pages = 1;
        }
        let mmap = map_with_retry(&file, num_pages)?;
        Ok(PageStore { file, mmap, num_pages })
    }

    pub fn num_pages(&self) -> BlockNo {
        self.num_pages
    }

    /// Allocates a new zero-filled page and returns its block number.
    pub fn allocate_new(&mut self) -> Result<BlockNo> {
        let blk = self.num_pages;
        self.num_pages += 1;
        self.file.set_len(self.num_pages as u64 * PAGE_SIZE as u64)?;
        self.remap()?;
        Ok(blk)
    }

    /// Remaps the backing file after it has grown (spec §7 `TransientIO`:
    /// "retried once at the buffer layer; on second failure surfaced as
    /// fatal to query").
    fn remap(&mut self) -> Result<()> {
        self.mmap = map_with_retry(&self.file, self.num_pages)?;
        Ok(())
    }

    /// A "page read" is just a slice copy out of the live mapping, so unlike
    /// the remap path above it has no OS call that could fail transiently;
    /// `TransientIO` is produced at `allocate_new`/`remap`, not here.
    pub fn read(&mut self, blk: BlockNo) -> Result<[u8; PAGE_SIZE]> {
        debug_assert!(blk != NULL_BLOCK, "attempted to read the null block");
        let start = blk as usize * PAGE_SIZE;
        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(&self.mmap[start..start + PAGE_SIZE]);
        Ok(buf)
    }

    pub fn write(&mut self, blk: BlockNo, data: &[u8; PAGE_SIZE]) -> Result<()> {
        debug_assert!(blk != NULL_BLOCK, "attempted to write the null block");
        let start = blk as usize * PAGE_SIZE;
        self.mmap[start..start + PAGE_SIZE].copy_from_slice(data);
        Ok(())
    }

    /// Flushes all writes to stable storage. The real adapter flushes a
    /// single page; an mmap gives us only whole-mapping msync, which is a
    /// documented simplification (see DESIGN.md).
    pub fn flush(&mut self, _blk: BlockNo) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    pub fn flush_all(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        assert_eq!(store.num_pages(), 1); // metapage reserved

        let blk = store.allocate_new().unwrap();
        assert_eq!(blk, 1);

        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        store.write(blk, &page).unwrap();
        store.flush(blk).unwrap();

        let read_back = store.read(blk).unwrap();
        assert_eq!(u32::from_le_bytes(read_back[0..4].try_into().unwrap()), 0xDEADBEEF);
    }

    #[test]
    fn reopen_preserves_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        {
            let mut store = PageStore::open(&path).unwrap();
            store.allocate_new().unwrap();
            store.allocate_new().unwrap();
            store.flush_all().unwrap();
        }
        let store = PageStore::open(&path).unwrap();
        assert_eq!(store.num_pages(), 3);
    }
}
