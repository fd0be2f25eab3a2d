//! ## Sample Trips
//!
//! A synthetic trip table for trying the loader without any data at hand. Pickups are spread
//! evenly over 2024; the other columns are drawn from a seeded generator, so the same seed always
//! gives the same table.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampNanosecondArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use datafusion::prelude::{DataFrame, SessionContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub const DEFAULT_SAMPLE_ROWS: usize = 10_000;
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

const NANOS_PER_MINUTE: i64 = 60_000_000_000;

/// Payment labels and their cumulative probabilities.
const PAYMENT_TYPES: [(&str, f64); 3] = [("Credit Card", 0.6), ("Cash", 0.9), ("Mobile", 1.0)];

/// Exponentially distributed draw with the given mean.
fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    -mean * (1.0 - rng.gen::<f64>()).ln()
}

fn payment_type(rng: &mut StdRng) -> &'static str {
    let draw: f64 = rng.gen();
    PAYMENT_TYPES
        .iter()
        .find(|(_, cumulative)| draw < *cumulative)
        .map_or(PAYMENT_TYPES[2].0, |(label, _)| label)
}

/// Midnight of a day as nanoseconds since the epoch.
fn midnight(year: i32, month: u32, day: u32) -> TripLoaderResult<i64> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|dt| dt.and_utc().timestamp_nanos_opt())
        .ok_or_else(|| {
            TripLoaderError::InvalidParameter(format!("{}-{}-{} is out of range", year, month, day))
        })
}

/// Builds `rows` synthetic trips as one in-memory batch.
pub fn sample_batch(rows: usize, seed: u64) -> TripLoaderResult<RecordBatch> {
    if rows == 0 {
        return Err(TripLoaderError::InvalidParameter(
            "A sample needs at least one row".to_string(),
        ));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let start = midnight(2024, 1, 1)?;
    let end = midnight(2024, 12, 31)?;
    // First and last pickups land exactly on the ends of the year.
    let span = i128::from(end - start);
    let last = (rows as i128 - 1).max(1);
    let pickups: Vec<i64> = (0..rows as i128)
        .map(|i| start + (span * i / last) as i64)
        .collect();
    let dropoffs: Vec<i64> = pickups
        .iter()
        .map(|p| p + rng.gen_range(5..60) * NANOS_PER_MINUTE)
        .collect();
    let passengers: Vec<i64> = (0..rows).map(|_| rng.gen_range(1..6)).collect();
    let distances: Vec<f64> = (0..rows).map(|_| exponential(&mut rng, 3.0)).collect();
    let fares: Vec<f64> = (0..rows).map(|_| exponential(&mut rng, 15.0) + 5.0).collect();
    let tips: Vec<f64> = (0..rows).map(|_| exponential(&mut rng, 3.0)).collect();
    let totals: Vec<f64> = (0..rows).map(|_| exponential(&mut rng, 20.0) + 8.0).collect();
    let payments: Vec<&str> = (0..rows).map(|_| payment_type(&mut rng)).collect();
    let mut coordinates = |low: f64, high: f64| -> Vec<f64> {
        (0..rows).map(|_| rng.gen_range(low..high)).collect()
    };
    let pickup_latitudes = coordinates(40.6, 40.9);
    let pickup_longitudes = coordinates(-74.05, -73.75);
    let dropoff_latitudes = coordinates(40.6, 40.9);
    let dropoff_longitudes = coordinates(-74.05, -73.75);

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("pickup_datetime", Arc::new(TimestampNanosecondArray::from(pickups))),
        ("dropoff_datetime", Arc::new(TimestampNanosecondArray::from(dropoffs))),
        ("passenger_count", Arc::new(Int64Array::from(passengers))),
        ("trip_distance", Arc::new(Float64Array::from(distances))),
        ("fare_amount", Arc::new(Float64Array::from(fares))),
        ("tip_amount", Arc::new(Float64Array::from(tips))),
        ("total_amount", Arc::new(Float64Array::from(totals))),
        ("payment_type", Arc::new(StringArray::from(payments))),
        ("pickup_latitude", Arc::new(Float64Array::from(pickup_latitudes))),
        ("pickup_longitude", Arc::new(Float64Array::from(pickup_longitudes))),
        ("dropoff_latitude", Arc::new(Float64Array::from(dropoff_latitudes))),
        ("dropoff_longitude", Arc::new(Float64Array::from(dropoff_longitudes))),
    ];
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    Ok(RecordBatch::try_new(
        schema,
        columns.into_iter().map(|(_, array)| array).collect(),
    )?)
}

/// [`sample_batch`] as a DataFrame in `ctx`.
pub fn sample_trips(ctx: &SessionContext, rows: usize, seed: u64) -> TripLoaderResult<DataFrame> {
    Ok(ctx.read_batch(sample_batch(rows, seed)?)?)
}
