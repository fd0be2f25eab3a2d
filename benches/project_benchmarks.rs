use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use criterion::{criterion_group, criterion_main, Criterion};
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};
use tokio::runtime::Runtime;
use trip_loader::normalizer::Normalizer;
use trip_loader::summary::TripSummary;

const ROWS: usize = 50_000;

async fn trips() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("tpep_pickup_datetime", DataType::Utf8, true),
        Field::new("passenger_count", DataType::Int64, true),
        Field::new("trip_distance", DataType::Float64, true),
        Field::new("fare_amount", DataType::Float64, true),
        Field::new("payment_type", DataType::Int64, true),
    ]));
    // Every tenth row repeats the one before it.
    let source = |i: usize| if i % 10 == 9 { i - 1 } else { i };
    let pickups: Vec<String> = (0..ROWS)
        .map(|i| {
            let i = source(i);
            format!("2024-01-{:02} {:02}:{:02}:00", i % 28 + 1, i % 24, i % 60)
        })
        .collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(pickups)),
            Arc::new(Int64Array::from_iter_values((0..ROWS).map(|i| (source(i) % 4 + 1) as i64))),
            Arc::new(Float64Array::from_iter_values((0..ROWS).map(|i| (source(i) % 50) as f64 * 0.3))),
            Arc::new(Float64Array::from_iter_values((0..ROWS).map(|i| 3.0 + (source(i) % 70) as f64))),
            Arc::new(Int64Array::from_iter_values((0..ROWS).map(|i| (source(i) % 5) as i64))),
        ],
    )
    .expect("build batch");
    let table = MemTable::try_new(schema, vec![vec![batch]]).expect("build table");
    let ctx = SessionContext::new();
    ctx.read_table(Arc::new(table)).expect("read table")
}

fn bench_normalize(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let df = rt.block_on(trips());
    let normalizer = Normalizer::default();

    c.bench_function("normalize 50k trips", |b| {
        b.iter(|| {
            rt.block_on(normalizer.normalize(df.clone()))
                .expect("normalize")
        })
    });
}

fn bench_summary(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let df = rt.block_on(async {
        Normalizer::default()
            .normalize(trips().await)
            .await
            .expect("normalize")
            .frame
    });

    c.bench_function("summarize 50k trips", |b| {
        b.iter(|| rt.block_on(TripSummary::compute(&df)).expect("summary"))
    });
}

criterion_group!(benches, bench_normalize, bench_summary);
criterion_main!(benches);
