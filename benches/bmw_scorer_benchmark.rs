use bm25ix::concurrency::LockMode;
use bm25ix::{Config, DocRef, Index, IndexId, IndexOptions, TokenizedTerm};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

/// Builds an index with `num_docs` documents, each drawing `words_per_doc`
/// tokens from a small vocabulary so a handful of terms end up with high
/// document frequency and the rest stay selective.
fn build_index(num_docs: u64, words_per_doc: usize) -> (tempfile::TempDir, Index) {
    let dir = tempfile::tempdir().unwrap();
    let index = Index::open(IndexId(1), dir.path().join("idx.bin"), IndexOptions::new("simple"), Config::default()).unwrap();

    let vocab = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "rust", "search"];
    let mut rng = rand::thread_rng();
    let mut txn = index.begin_txn(LockMode::Exclusive);
    for doc_ref in 1..=num_docs {
        let terms: Vec<TokenizedTerm> = (0..words_per_doc)
            .map(|_| TokenizedTerm { term: vocab[rng.gen_range(0..vocab.len())].to_string(), tf: 1 })
            .collect();
        index.add_document(&mut txn, DocRef(doc_ref), &terms, words_per_doc as i32).unwrap();
    }
    drop(txn);
    index.flush().unwrap();
    (dir, index)
}

fn bench_top_k_by_limit(c: &mut Criterion) {
    let (_dir, index) = build_index(5_000, 20);
    let mut group = c.benchmark_group("bmw_top_k_by_limit");
    for limit in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            index.set_limit(limit);
            b.iter(|| {
                let results: Vec<_> = index.search(&["the".to_string(), "quick".to_string()]).unwrap().collect();
                black_box(results);
            });
        });
    }
    group.finish();
}

fn bench_top_k_single_vs_multi_term(c: &mut Criterion) {
    let (_dir, index) = build_index(5_000, 20);
    let mut group = c.benchmark_group("bmw_top_k_term_count");
    index.set_limit(50);

    group.bench_function("single_term", |b| {
        b.iter(|| {
            let results: Vec<_> = index.search(&["rust".to_string()]).unwrap().collect();
            black_box(results);
        });
    });

    group.bench_function("five_terms", |b| {
        let terms: Vec<String> = ["the", "quick", "brown", "fox", "rust"].iter().map(|s| s.to_string()).collect();
        b.iter(|| {
            let results: Vec<_> = index.search(&terms).unwrap().collect();
            black_box(results);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_top_k_by_limit, bench_top_k_single_vs_multi_term);
criterion_main!(benches);
