use bm25ix::concurrency::LockMode;
use bm25ix::{Config, DocRef, Index, IndexId, IndexOptions, TokenizedTerm};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// One document, one distinct term — the cheapest possible memtable entry,
/// so spill frequency is governed entirely by `memtable_spill_threshold`.
fn term_for(doc_ref: u64) -> TokenizedTerm {
    TokenizedTerm { term: format!("term{doc_ref}"), tf: 1 }
}

fn bench_spill_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("memtable_spill_threshold");
    for threshold in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &threshold, |b, &threshold| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let mut config = Config::default();
                config.memtable_spill_threshold = threshold;
                let index = Index::open(IndexId(1), dir.path().join("idx.bin"), IndexOptions::new("simple"), config).unwrap();

                let mut txn = index.begin_txn(LockMode::Exclusive);
                for doc_ref in 1..=(threshold as u64 * 2) {
                    index.add_document(&mut txn, DocRef(doc_ref), &[term_for(doc_ref)], 1).unwrap();
                }
                drop(txn);
                black_box(index.flush().unwrap());
            });
        });
    }
    group.finish();
}

fn bench_compaction_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("compaction_cascade");
    for spills in [8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(spills), &spills, |b, &spills| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let mut config = Config::default();
                config.memtable_spill_threshold = 1;
                config.segments_per_level = 2;
                config.max_levels = 4;
                let index = Index::open(IndexId(1), dir.path().join("idx.bin"), IndexOptions::new("simple"), config).unwrap();

                let mut txn = index.begin_txn(LockMode::Exclusive);
                for doc_ref in 1..=spills as u64 {
                    index.add_document(&mut txn, DocRef(doc_ref), &[term_for(doc_ref)], 1).unwrap();
                }
                drop(txn);
                black_box(index.flush().unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spill_threshold, bench_compaction_cascade);
criterion_main!(benches);
