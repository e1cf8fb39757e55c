use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use searchable::config::BATCH_MERGE_FACTOR;
use searchable::index::{Document, IndexSearcher, IndexWriter, IndexWriterConfig, OpenMode};
use searchable::storage::memory::MemoryStorageConfig;
use searchable::storage::{Storage, StorageConfig, StorageFactory};
use searchable::{IndexConfig, IndexLifecycle, QueryExecutor, ResourceRegistry, SearchOptions, TypeRegistry};

const WORDS: [&str; 8] = [
    "alpha", "beta", "gamma", "delta", "case", "index", "search", "result",
];

fn generate_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let title = format!("{} {}", WORDS[i % WORDS.len()], WORDS[(i / 3) % WORDS.len()]);
            Document::new()
                .add_keyword("_id", i.to_string())
                .add_keyword("_type", "Bench")
                .add_text("title", title)
        })
        .collect()
}

fn build_index(count: usize, config: IndexWriterConfig) -> Arc<dyn Storage> {
    let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))
        .unwrap();
    let mut writer = IndexWriter::open(storage.clone(), config, OpenMode::Create).unwrap();
    for doc in generate_documents(count) {
        writer.add_document(doc).unwrap();
    }
    writer.close().unwrap();
    storage
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Indexing");
    group.sample_size(10);

    for count in [1000, 5000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("interactive", count), count, |b, &count| {
            b.iter(|| build_index(count, IndexWriterConfig::default()))
        });
        group.bench_with_input(BenchmarkId::new("batch", count), count, |b, &count| {
            let config = IndexWriterConfig {
                merge_factor: BATCH_MERGE_FACTOR,
                ..Default::default()
            };
            b.iter(|| build_index(count, config.clone()))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Search");
    group.sample_size(10);

    let storage = build_index(5000, IndexWriterConfig::default());
    let reader = Arc::new(searchable::index::IndexReader::open(storage).unwrap());
    let searcher = IndexSearcher::new(reader);
    let query = searchable::QueryParser::new(vec!["title".to_string()])
        .parse("alpha OR case")
        .unwrap();

    group.bench_function("engine_top_10", |b| {
        b.iter(|| searcher.search(&query, None, 10, &searchable::Sort::relevance()).unwrap())
    });

    let lifecycle = Arc::new(IndexLifecycle::new(
        ResourceRegistry::shared(),
        IndexConfig::memory("bench"),
    ));
    {
        let writer = lifecycle.acquire_writer().unwrap();
        let mut writer = writer.lock();
        for doc in generate_documents(5000) {
            writer.add_document(doc).unwrap();
        }
        writer.commit().unwrap();
    }
    let executor = QueryExecutor::new(lifecycle, Arc::new(TypeRegistry::new()));

    group.bench_function("executor_page_of_10", |b| {
        b.iter(|| {
            executor
                .search(SearchOptions::text("alpha case").with_offset(20).with_limit(10))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_indexing, bench_search);
criterion_main!(benches);
