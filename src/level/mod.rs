//! Tiered LSM level manager: tracks segment counts per level and drives the
//! merge cascade once a level reaches its fanout `K`.

pub mod merge;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{BlockNo, NULL_BLOCK};
use crate::metapage::MetaPage;
use crate::page::PageStore;
use crate::segment::SegmentReader;

/// Registers a freshly spilled or merged segment as the new head of
/// `level`, then runs the cascade: while a level holds `segments_per_level`
/// or more segments, merge the whole level into one segment one level down.
pub fn add_segment(store: &mut PageStore, meta: &mut MetaPage, level: usize, root: BlockNo, config: &Config) -> Result<()> {
    meta.level_heads[level] = root;
    meta.level_counts[level] += 1;
    cascade(store, meta, level, config)
}

fn chain_roots(store: &mut PageStore, head: BlockNo) -> Result<Vec<BlockNo>> {
    let mut roots = Vec::new();
    let mut blk = head;
    while blk != NULL_BLOCK {
        roots.push(blk);
        let reader = SegmentReader::open(store, blk)?;
        blk = reader.next_segment();
    }
    Ok(roots)
}

fn cascade(store: &mut PageStore, meta: &mut MetaPage, mut level: usize, config: &Config) -> Result<()> {
    loop {
        if (meta.level_counts[level] as u16) < config.segments_per_level {
            return Ok(());
        }

        if level + 1 >= config.max_levels {
            log::warn!("level {level} reached max_levels ({}); leaving segments unmerged", config.max_levels);
            return Ok(());
        }
        let target_level = level + 1;

        let roots = chain_roots(store, meta.level_heads[level])?;
        let merged = merge::merge_segments(store, &roots, target_level as u32, meta.level_heads[target_level])?;
        log::debug!("compacted {} segments from level {level} into level {target_level}", roots.len());

        meta.level_heads[level] = NULL_BLOCK;
        meta.level_counts[level] = 0;

        meta.level_heads[target_level] = merged;
        meta.level_counts[target_level] += 1;
        level = target_level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::arena::Arena;
    use crate::core::types::{DocRef, TokenizedTerm};
    use crate::memtable::Memtable;
    use crate::segment::write_segment;
    use std::sync::Arc;

    fn term(s: &str, tf: u32) -> TokenizedTerm {
        TokenizedTerm { term: s.to_string(), tf }
    }

    #[test]
    fn cascade_merges_a_full_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut meta = MetaPage::empty();
        let mut config = Config::default();
        config.segments_per_level = 2;

        for batch in 0..2u64 {
            let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
            mt.add_document(DocRef(batch * 10 + 1), &[term("alpha", 1)], 1).unwrap();
            let next = meta.level_heads[0];
            let root = write_segment(&mut store, &mt, 0, next, &config).unwrap();
            add_segment(&mut store, &mut meta, 0, root, &config).unwrap();
        }

        assert_eq!(meta.level_counts[0], 0);
        assert_eq!(meta.level_counts[1], 1);
        let reader = SegmentReader::open(&mut store, meta.level_heads[1]).unwrap();
        assert_eq!(reader.num_docs(), 2);
    }

    #[test]
    fn update_keeps_youngest_posting_on_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut meta = MetaPage::empty();
        let mut config = Config::default();
        config.segments_per_level = 2;

        let mt1 = Memtable::new(Arc::new(Arena::unbounded()), 4);
        mt1.add_document(DocRef(1), &[term("old", 1)], 1).unwrap();
        let root1 = write_segment(&mut store, &mt1, 0, meta.level_heads[0], &config).unwrap();
        add_segment(&mut store, &mut meta, 0, root1, &config).unwrap();

        let mt2 = Memtable::new(Arc::new(Arena::unbounded()), 4);
        mt2.add_document(DocRef(1), &[term("new", 1)], 1).unwrap();
        let root2 = write_segment(&mut store, &mt2, 0, meta.level_heads[0], &config).unwrap();
        add_segment(&mut store, &mut meta, 0, root2, &config).unwrap();

        let reader = SegmentReader::open(&mut store, meta.level_heads[1]).unwrap();
        assert_eq!(reader.num_docs(), 1);
        assert!(reader.lookup_term(&mut store, "old").unwrap().is_none());
        assert!(reader.lookup_term(&mut store, "new").unwrap().is_some());
    }

    #[test]
    fn cascade_stops_at_max_levels_instead_of_merging_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PageStore::open(dir.path().join("idx.bin")).unwrap();
        let mut meta = MetaPage::empty();
        let mut config = Config::default();
        config.segments_per_level = 2;
        config.max_levels = 2;

        // Level 1 is the last level (max_levels = 2), so once level 0's
        // cascade pushes segments into it, they must accumulate there
        // rather than being merged in place.
        for batch in 0..6u64 {
            let mt = Memtable::new(Arc::new(Arena::unbounded()), 4);
            mt.add_document(DocRef(batch + 1), &[term(&format!("t{batch}"), 1)], 1).unwrap();
            let next = meta.level_heads[0];
            let root = write_segment(&mut store, &mt, 0, next, &config).unwrap();
            add_segment(&mut store, &mut meta, 0, root, &config).unwrap();
        }

        assert_eq!(meta.level_counts[0], 0);
        // 6 level-0 spills cascade in twos: three segments land on level 1,
        // exceeding segments_per_level (2), and none of them collapse since
        // there is no level 2 to merge into.
        assert_eq!(meta.level_counts[1], 3);
        let roots = chain_roots(&mut store, meta.level_heads[1]).unwrap();
        assert_eq!(roots.len(), 3);
        for blk in roots {
            let reader = SegmentReader::open(&mut store, blk).unwrap();
            assert_eq!(reader.num_docs(), 2);
        }
    }
}
