//! Top-level engine: one `Index` per physical page file, wiring the page
//! store, metapage, shared index state, docid log, and the build/scan
//! entry points into a single handle.
//!
//! Index options (`text_config`, `k1`, `b`) are supplied by the caller on
//! every `open`/`create` rather than persisted in the page file — the same
//! split the host database uses, where reloptions live in a system catalog
//! alongside the relation rather than inside the relation's own storage.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::build::{self, BuildProgress, BuildStats};
use crate::concurrency::registry::{Registry, SharedIndexState};
use crate::concurrency::{LockMode, TxnGuard};
use crate::core::config::{Config, IndexOptions};
use crate::core::error::Result;
use crate::core::types::{DocRef, IndexId, TokenizedTerm};
use crate::docidlog::DocidLog;
use crate::limit::LimitRegistry;
use crate::metapage::MetaPage;
use crate::page::PageStore;
use crate::scan::{self, ScanCursor};

pub struct Index {
    id: IndexId,
    config: Config,
    state: Arc<SharedIndexState>,
    store: Mutex<PageStore>,
    meta: Mutex<MetaPage>,
    docid_log: Mutex<DocidLog>,
}

impl Index {
    /// Opens (creating if absent) the page file at `path` with a private,
    /// unshared state. Suitable for single-handle embedding; two `Index`
    /// values opened this way against the same `id` do **not** share a
    /// memtable — use [`Database::open`](crate::database::Database::open)
    /// when several handles must attach to the same shared index state
    /// (spec §2 "Shared arena & registry", invariant 7).
    pub fn open(id: IndexId, path: impl AsRef<Path>, options: IndexOptions, config: Config) -> Result<Self> {
        options.validate()?;
        let state = Arc::new(SharedIndexState::new(id, options, config.runtime_arena_capacity));
        Self::from_parts(id, path, config, state)
    }

    /// Opens `path`, attaching to `registry`'s shared state for `id` —
    /// lazily created by whichever caller gets there first, reused by every
    /// later attach (spec invariant 7). This is what [`Database`](crate::database::Database)
    /// uses internally.
    pub fn open_with_registry(
        registry: &Registry,
        id: IndexId,
        path: impl AsRef<Path>,
        options: IndexOptions,
        config: Config,
    ) -> Result<Self> {
        options.validate()?;
        let arena_capacity = config.runtime_arena_capacity;
        let state = registry.get_or_create(id, || options, arena_capacity);
        Self::from_parts(id, path, config, state)
    }

    fn from_parts(id: IndexId, path: impl AsRef<Path>, config: Config, state: Arc<SharedIndexState>) -> Result<Self> {
        let mut store = PageStore::open(path)?;
        let meta = if store.num_pages() <= 1 {
            let empty = MetaPage::empty();
            empty.write(&mut store)?;
            empty
        } else {
            MetaPage::read(&mut store)?
        };

        Ok(Index { id, config, state, store: Mutex::new(store), meta: Mutex::new(meta), docid_log: Mutex::new(DocidLog::new()) })
    }

    pub fn index_id(&self) -> IndexId {
        self.id
    }

    /// Replays the docid recovery log, asking `rebuild` to re-tokenize each
    /// logged `doc_ref` from the host's own storage (this crate has no
    /// access to document text, only to `doc_ref`s). Should be called once
    /// after `open`, before any query.
    pub fn recover(&self, mut rebuild: impl FnMut(DocRef) -> Result<Option<(Vec<TokenizedTerm>, i32)>>) -> Result<u64> {
        let mut store = self.store.lock();
        let meta = self.meta.lock();
        let mut recovered = 0u64;
        let mut pending = Vec::new();
        DocidLog::replay(&mut store, meta.docid_log_anchor, |doc_ref| pending.push(doc_ref))?;
        drop(meta);

        let mut txn = TxnGuard::acquire(&self.state.lock, LockMode::Exclusive);
        for doc_ref in pending {
            if let Some((terms, doc_length)) = rebuild(doc_ref)? {
                self.state.memtable.add_document(doc_ref, &terms, doc_length)?;
                txn.record_terms_added(terms.len());
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Acquires the per-index lock for the duration of a caller-managed
    /// transaction. `add_document` calls sharing one guard accumulate
    /// toward `bulk_load_threshold`.
    pub fn begin_txn(&self, mode: LockMode) -> TxnGuard<'_> {
        TxnGuard::acquire(&self.state.lock, mode)
    }

    pub fn add_document(&self, txn: &mut TxnGuard, doc_ref: DocRef, terms: &[TokenizedTerm], doc_length: i32) -> Result<()> {
        let mut store = self.store.lock();
        let mut meta = self.meta.lock();
        let mut docid_log = self.docid_log.lock();
        build::add_document(&self.state, &mut store, &mut meta, &self.config, &mut docid_log, txn, doc_ref, terms, doc_length)
    }

    pub fn build_from_iter(
        &self,
        txn: &mut TxnGuard,
        docs: impl IntoIterator<Item = (DocRef, Vec<TokenizedTerm>, i32)>,
        progress: Option<&mut dyn BuildProgress>,
    ) -> Result<BuildStats> {
        let mut store = self.store.lock();
        let mut meta = self.meta.lock();
        let mut docid_log = self.docid_log.lock();
        build::build_from_iter(&self.state, &mut store, &mut meta, &self.config, &mut docid_log, txn, docs, progress)
    }

    /// Sets the LIMIT the next `search` on this index should push down to
    /// the scorer, as a query planner would after choosing a plan.
    pub fn set_limit(&self, limit: usize) {
        LimitRegistry::set(self.id, limit);
    }

    pub fn search(&self, query_terms: &[String]) -> Result<ScanCursor> {
        let mut store = self.store.lock();
        let meta = self.meta.lock();
        scan::scan(&self.state.lock, self.id, &mut store, &self.state.memtable, &meta, &self.config, &self.state.options, query_terms)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.lock().flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TokenizedTerm;

    fn term(s: &str, tf: u32) -> TokenizedTerm {
        TokenizedTerm { term: s.to_string(), tf }
    }

    #[test]
    fn open_add_search_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(IndexId(1), dir.path().join("idx.bin"), IndexOptions::new("simple"), Config::default()).unwrap();

        let mut txn = index.begin_txn(LockMode::Exclusive);
        index.add_document(&mut txn, DocRef(1), &[term("quick", 1), term("brown", 1), term("fox", 1)], 3).unwrap();
        index.add_document(&mut txn, DocRef(2), &[term("lazy", 1), term("brown", 1), term("dog", 1)], 3).unwrap();
        drop(txn);

        index.set_limit(10);
        let results: Vec<_> = index.search(&["brown".to_string()]).unwrap().collect();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn recover_replays_unspilled_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let corpus = [(DocRef(1), vec![term("alpha", 1)], 1), (DocRef(2), vec![term("beta", 1)], 1)];

        {
            let index = Index::open(IndexId(1), &path, IndexOptions::new("simple"), Config::default()).unwrap();
            let mut txn = index.begin_txn(LockMode::Exclusive);
            for (doc_ref, terms, len) in &corpus {
                index.add_document(&mut txn, *doc_ref, terms, *len).unwrap();
            }
            drop(txn);
            index.flush().unwrap();
            // simulate a crash: `index`'s in-memory state is dropped without a spill.
        }

        let reopened = Index::open(IndexId(1), &path, IndexOptions::new("simple"), Config::default()).unwrap();
        let lookup: std::collections::HashMap<_, _> = corpus.iter().map(|(r, t, l)| (*r, (t.clone(), *l))).collect();
        let recovered = reopened
            .recover(|doc_ref| Ok(lookup.get(&doc_ref).cloned()))
            .unwrap();
        assert_eq!(recovered, 2);

        reopened.set_limit(10);
        let results: Vec<_> = reopened.search(&["alpha".to_string()]).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, DocRef(1));
    }
}
