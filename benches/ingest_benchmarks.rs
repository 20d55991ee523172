use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livepivot::*;
use serde_json::{json, Value};

fn records(size: usize, overflow_at: Option<usize>) -> Value {
    let rows: Vec<Value> = (0..size)
        .map(|i| {
            let qty = if Some(i) == overflow_at { 5_000_000_000i64 } else { (i % 9000 + 1) as i64 };
            json!({"sym": format!("S{}", i % 50), "qty": qty, "px": i as f64 * 0.5, "live": i % 2 == 0})
        })
        .collect();
    Value::Array(rows)
}

fn bench_infer_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_schema");

    for size in [100, 1000, 10000].iter() {
        let accessor = BatchAccessor::from_json(records(*size, None)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| infer_schema(black_box(&accessor), &LogDiagnostics).unwrap());
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_load");

    for size in [100, 1000, 10000].iter() {
        let accessor = BatchAccessor::from_json(records(*size, None)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| Table::new(black_box(&accessor), TableOptions::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_load_with_promotion(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_load_promotion");

    for size in [100, 1000, 10000].iter() {
        // Overflow on the last row so every earlier cell is carried over
        let accessor = BatchAccessor::from_json(records(*size, Some(size - 1))).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| Table::new(black_box(&accessor), TableOptions::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_indexed_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_update");

    for size in [100, 1000, 10000].iter() {
        let accessor = BatchAccessor::from_json(records(*size, None)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter_batched(
                || Table::new(&accessor, TableOptions::with_index("sym")).unwrap(),
                |mut table| table.update(black_box(&accessor)).unwrap(),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_view_config(c: &mut Criterion) {
    let table = Table::from_json(records(100, None), TableOptions::default()).unwrap();
    let raw = RawViewConfig::from_json(
        r#"{"row-pivots": ["sym"], "column-pivots": ["live"], "aggregates": {"px": "avg"},
            "sort": [["px", "desc"]], "filter": [["qty", ">", 10], ["sym", "in", ["S1", "S2"]]]}"#,
    )
    .unwrap();

    c.bench_function("view_config", |b| {
        b.iter(|| table.view_config(black_box(&raw)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_infer_schema,
    bench_load,
    bench_load_with_promotion,
    bench_indexed_update,
    bench_view_config,
);

criterion_main!(benches);
