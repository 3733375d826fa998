//! Scan driver: assembles a data source, pushes the planner's LIMIT (if
//! any) into the BMW evaluator, and hands back a cursor whose scores are
//! precomputed — so a later `ORDER BY rank` doesn't re-run BM25.

use crate::concurrency::{IndexLock, LockMode, TxnGuard};
use crate::core::config::{Config, IndexOptions};
use crate::core::error::Result;
use crate::core::types::{DocRef, IndexId};
use crate::datasource::DataSource;
use crate::limit::LimitRegistry;
use crate::memtable::Memtable;
use crate::metapage::MetaPage;
use crate::page::PageStore;
use crate::scoring;

pub struct ScanCursor {
    results: Vec<(DocRef, f32)>,
    pos: usize,
    docs_scored: u64,
}

impl ScanCursor {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of full BM25 score computations this scan's BMW pass
    /// performed. Exposed so a LIMIT pushdown's effect on scorer work can
    /// be observed without instrumenting the host planner.
    pub fn docs_scored(&self) -> u64 {
        self.docs_scored
    }
}

impl Iterator for ScanCursor {
    type Item = (DocRef, f32);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.results.get(self.pos).copied()?;
        self.pos += 1;
        Some(item)
    }
}

/// Runs one query: acquires a shared lock for the duration of the scan,
/// builds the data source snapshot, and evaluates BMW down to the
/// effective LIMIT (planner-supplied, or the configured default, capped at
/// `max_query_limit`).
pub fn scan(
    lock: &IndexLock,
    index_id: IndexId,
    store: &mut PageStore,
    memtable: &Memtable,
    meta: &MetaPage,
    config: &Config,
    options: &IndexOptions,
    query_terms: &[String],
) -> Result<ScanCursor> {
    let _guard = TxnGuard::acquire(lock, LockMode::Shared);

    let limit = LimitRegistry::take(index_id).unwrap_or(config.default_query_limit).min(config.max_query_limit);

    let mut source = DataSource::open(store, memtable, meta, config)?;
    let (results, docs_scored) = scoring::top_k_with_stats(&mut source, query_terms, limit, options.k1, options.b)?;

    if config.log_scores {
        for (doc_ref, score) in &results {
            log::debug!("doc_ref={} score={score}", doc_ref.value());
        }
    }

    Ok(ScanCursor { results, pos: 0, docs_scored })
}
