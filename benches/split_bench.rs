//! Benchmarks for split operations.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::explicit_iter_loop,
    missing_docs
)]

use std::sync::Arc;

use arrow::{
    array::{Float64Array, Int32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use muestra::{
    split_by_id, uniform_split, ArrowDataset, Binner, DatasetSplit, StratifiedShuffleSplit,
};

fn create_dataset(rows: usize) -> ArrowDataset {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("median_income", DataType::Float64, false),
    ]));

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let ids: Vec<i32> = (0..rows as i32).collect();
    let incomes: Vec<f64> = ids.iter().map(|&i| f64::from(i % 97) * 0.1).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(ids)),
            Arc::new(Float64Array::from(incomes)),
        ],
    )
    .expect("Failed to create batch");

    let dataset = ArrowDataset::from_batch(batch).expect("Failed to create dataset");
    Binner::with_default_labels(vec![0.0, 1.5, 3.0, 4.5, 6.0])
        .expect("Failed to create binner")
        .apply(&dataset, "median_income", "income_cat")
        .expect("Failed to bin")
}

fn bench_uniform_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("uniform_split");

    for size in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| uniform_split(black_box(size), 0.2, 42).unwrap());
        });
    }

    group.finish();
}

fn bench_stratified_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("stratified_split");

    for size in [1_000, 10_000, 100_000].iter() {
        let dataset = create_dataset(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dataset, |b, dataset| {
            b.iter(|| {
                StratifiedShuffleSplit::new(0.2)
                    .seed(42)
                    .n_repeats(5)
                    .split(black_box(dataset), "income_cat")
                    .unwrap()
                    .count()
            });
        });
    }

    group.finish();
}

fn bench_id_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_by_id");

    for size in [1_000, 10_000, 100_000].iter() {
        let dataset = create_dataset(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dataset, |b, dataset| {
            b.iter(|| split_by_id(black_box(dataset), "id", 0.2).unwrap());
        });
    }

    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");

    for size in [1_000, 10_000, 100_000].iter() {
        let dataset = create_dataset(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dataset, |b, dataset| {
            b.iter(|| DatasetSplit::uniform(black_box(dataset), 0.2, 42).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uniform_split,
    bench_stratified_split,
    bench_id_split,
    bench_materialize
);
criterion_main!(benches);
