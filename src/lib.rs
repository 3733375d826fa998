//! `bm25ix`: an embedded BM25 ranking-index storage engine.
//!
//! This crate implements the storage and scoring core of a full-text search
//! index — the part of an access method below the host database's
//! build/insert/scan dispatch, SQL types, and tokenizer. Given already
//! tokenized documents (`(term, tf)` pairs plus a document length) it
//! maintains an in-memory write buffer (the memtable), spills it to
//! immutable on-disk segments arranged in LSM-style levels, compacts levels
//! as they fill, and answers top-K queries with a Block-Max WAND scorer.
//!
//! What this crate does *not* do, by design (spec §1 "Non-goals" and the
//! host-boundary list): parse SQL, tokenize text, manage buffer pages, or
//! dispatch planner cost hooks. Callers own all of that and hand this crate
//! `(doc_ref, [(term, tf)], doc_length)` triples on the way in and read back
//! `(doc_ref, score)` pairs on the way out.
//!
//! The top-level entry point is [`Index`](index::Index); [`core::config`]
//! holds the tunables and index options; [`core::error`] is the crate's
//! error type.

pub mod build;
pub mod concurrency;
pub mod core;
pub mod database;
pub mod datasource;
pub mod docidlog;
pub mod index;
pub mod intern;
pub mod level;
pub mod limit;
pub mod memtable;
pub mod metapage;
pub mod page;
pub mod scan;
pub mod scoring;
pub mod segment;

pub use build::{BuildProgress, BuildStats};
pub use core::config::{Config, IndexOptions};
pub use core::error::{Error, ErrorKind, Result};
pub use core::types::{DocRef, IndexId, TokenizedTerm};
pub use database::Database;
pub use index::Index;
pub use scan::ScanCursor;
