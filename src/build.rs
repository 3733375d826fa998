//! Build orchestration: validates options, accepts already-tokenized
//! documents, decides when the memtable spills, drives the level cascade,
//! and checkpoints cancellation.

use crate::concurrency::registry::SharedIndexState;
use crate::concurrency::{LockMode, TxnGuard};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{DocRef, TokenizedTerm};
use crate::docidlog::DocidLog;
use crate::level;
use crate::metapage::MetaPage;
use crate::page::PageStore;
use crate::scoring::bm25;

/// Invoked every 1,000 documents during a build; returning `false` cancels
/// the remainder of the build with `ErrorKind::Canceled`.
pub trait BuildProgress {
    fn on_progress(&mut self, docs_indexed: u64) -> bool;
}

const CANCEL_CHECK_INTERVAL: u64 = 1_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub docs_indexed: u64,
}

/// Adds one document to the memtable, logging it to the docid recovery log
/// first so a crash before the memtable write completes still leaves the
/// document recoverable, then spills if a threshold was crossed. The
/// caller must be holding `txn`'s exclusive lock over `state`.
pub fn add_document(
    state: &SharedIndexState,
    store: &mut PageStore,
    meta: &mut MetaPage,
    config: &Config,
    docid_log: &mut DocidLog,
    txn: &mut TxnGuard,
    doc_ref: DocRef,
    terms: &[TokenizedTerm],
    doc_length: i32,
) -> Result<()> {
    debug_assert_eq!(txn.mode(), LockMode::Exclusive);
    docid_log.append(store, &mut meta.docid_log_anchor, doc_ref)?;
    state.memtable.add_document(doc_ref, terms, doc_length)?;
    txn.record_terms_added(terms.len());
    maybe_spill(state, store, meta, config, docid_log, txn)
}

fn maybe_spill(
    state: &SharedIndexState,
    store: &mut PageStore,
    meta: &mut MetaPage,
    config: &Config,
    docid_log: &mut DocidLog,
    txn: &TxnGuard,
) -> Result<()> {
    let stats = state.memtable.stats();
    let over_spill_threshold = stats.total_posting_entries as usize >= config.memtable_spill_threshold;
    let over_bulk_threshold = txn.terms_added() >= config.bulk_load_threshold;
    if over_spill_threshold || over_bulk_threshold {
        spill_memtable(state, store, meta, config)?;
        docid_log.clear_after_spill(&mut meta.docid_log_anchor);
        meta.write(store)?;
    }
    Ok(())
}

/// Writes the memtable's current contents as a new level-0 segment,
/// updates corpus statistics, runs the compaction cascade, and clears the
/// memtable in place. Leaves `meta` unwritten — the caller flushes it once
/// alongside the docid-log reset.
fn spill_memtable(state: &SharedIndexState, store: &mut PageStore, meta: &mut MetaPage, config: &Config) -> Result<()> {
    if state.memtable.is_empty() {
        return Ok(());
    }

    let next = meta.level_heads[0];
    let root = crate::segment::write_segment(store, &state.memtable, 0, next, config)?;
    store.flush_all()?;

    let mt_stats = state.memtable.stats();
    let new_total_docs = meta.total_docs + mt_stats.doc_count;

    // Best-effort sum_idf update: folds in the idf of every term spilled
    // this round against the post-spill document count. Not reconciled
    // against terms that already existed pre-spill — total_terms /
    // sum_idf are informational statistics, not an invariant checked
    // anywhere in the query path.
    let mut sum_idf_delta = 0.0f64;
    for term in state.memtable.terms_sorted() {
        if let Some(entries) = state.memtable.search_term(&term) {
            sum_idf_delta += bm25::idf(new_total_docs, entries.len() as u32) as f64;
        }
    }

    meta.total_docs = new_total_docs;
    meta.total_len += mt_stats.length_sum;
    meta.sum_idf += sum_idf_delta;

    level::add_segment(store, meta, 0, root, config)?;
    state.memtable.clear_runtime();
    Ok(())
}

/// Runs once after the last document of a build: flushes any remaining
/// memtable contents and shrinks the arena from its build-time budget down
/// to the steady-state runtime cap.
pub fn finalize_build(state: &SharedIndexState, store: &mut PageStore, meta: &mut MetaPage, config: &Config, docid_log: &mut DocidLog) -> Result<()> {
    if !state.memtable.is_empty() {
        spill_memtable(state, store, meta, config)?;
        docid_log.clear_after_spill(&mut meta.docid_log_anchor);
    }
    meta.write(store)?;
    state.arena.set_capacity(config.runtime_arena_capacity);
    Ok(())
}

/// Drives a full build over an iterator of already-tokenized documents,
/// checkpointing cancellation every `CANCEL_CHECK_INTERVAL` documents.
pub fn build_from_iter(
    state: &SharedIndexState,
    store: &mut PageStore,
    meta: &mut MetaPage,
    config: &Config,
    docid_log: &mut DocidLog,
    txn: &mut TxnGuard,
    docs: impl IntoIterator<Item = (DocRef, Vec<TokenizedTerm>, i32)>,
    mut progress: Option<&mut dyn BuildProgress>,
) -> Result<BuildStats> {
    let mut count = 0u64;
    for (doc_ref, terms, doc_length) in docs {
        add_document(state, store, meta, config, docid_log, txn, doc_ref, &terms, doc_length)?;
        count += 1;
        if count % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(p) = progress.as_deref_mut() {
                if !p.on_progress(count) {
                    return Err(Error::canceled(format!("build canceled after {count} documents")));
                }
            }
        }
    }
    finalize_build(state, store, meta, config, docid_log)?;
    Ok(BuildStats { docs_indexed: count })
}
