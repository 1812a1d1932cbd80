//! Performance benchmarks for the aggregation engine
//! Measures row extraction, round reduction, and end-to-end runs per granularity

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;
use tallygrid::engine::{
    Aggregate, AggregateMode, AggregationDriver, Dispatcher, Granularity, LocalWorkerPool,
    PartialResult, Reducer,
};
use tallygrid::extract::{
    MonthlyTagPredicate, QueryPlan, RecordExtractor, RowAttributeExtractor, TagPredicate,
};
use tallygrid::source::RecordSource;
use tallygrid::testing::post;
use tokio::runtime::Runtime;

/// Mixed corpus: a third storm posts, spread over the year
fn create_corpus(count: usize) -> String {
    (0..count)
        .map(|i| {
            let created = format!("2014-{:02}-{:02}T12:00:00.000", i % 12 + 1, i % 28 + 1);
            let tags: &[&str] = match i % 3 {
                0 => &["apache-storm"],
                1 => &["storm", "apache", "java"],
                _ => &["python"],
            };
            post(i as u64, tags, Some(&created))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_row_extraction(c: &mut Criterion) {
    let extractor = RowAttributeExtractor::new();
    let line = post(42, &["storm", "apache", "java"], Some("2014-07-14T09:15:00.123"));

    c.bench_function("row_extraction", |b| {
        b.iter(|| extractor.extract(black_box(&line)))
    });
}

fn bench_round_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_reduction");
    let reducer = Reducer::new();

    for units in [10usize, 100, 1000] {
        let partials: Vec<PartialResult> = (0..units)
            .map(|i| PartialResult::buckets([((i % 12) as u32, 1)]))
            .collect();

        group.bench_with_input(BenchmarkId::new("bucketed", units), &partials, |b, partials| {
            b.iter_batched(
                || (Aggregate::new(AggregateMode::Bucketed), partials.clone()),
                |(mut aggregate, partials)| {
                    reducer.combine(&mut aggregate, partials).unwrap();
                    aggregate
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let corpus = create_corpus(2_000);
    let mut group = c.benchmark_group("end_to_end");
    group.sample_size(20);

    for granularity in [Granularity::Coarse, Granularity::Fine] {
        for batch_size in [10usize, 100] {
            let id = BenchmarkId::new(format!("{:?}", granularity), batch_size);
            group.bench_with_input(id, &batch_size, |b, &batch_size| {
                b.to_async(&rt).iter(|| async {
                    let plan = QueryPlan::with_predicate(MonthlyTagPredicate::new(
                        TagPredicate::apache_storm(),
                    ));
                    let pool = Arc::new(LocalWorkerPool::new(4, 2).unwrap());
                    let mut driver = AggregationDriver::new(plan, Dispatcher::new(pool))
                        .with_batch_size(batch_size)
                        .with_granularity(granularity);
                    let source = RecordSource::from_reader(Cursor::new(corpus.clone()), "bench");
                    black_box(driver.run_source(source).await.unwrap())
                })
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_row_extraction,
    bench_round_reduction,
    bench_end_to_end
);
criterion_main!(benches);
