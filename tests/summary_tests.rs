use std::sync::Arc;

use approx::assert_relative_eq;
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampNanosecondArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use trip_loader::exceptions::TripLoaderResult;
use trip_loader::summary::{first_datetime_column, DataPeriod, TripSummary};

fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_time(time.parse().unwrap())
}

fn nanos(date: &str, time: &str) -> i64 {
    at(date, time).and_utc().timestamp_nanos_opt().unwrap()
}

fn frame(columns: Vec<(&str, ArrayRef)>) -> DataFrame {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    let batch =
        RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
            .unwrap();
    let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.read_table(Arc::new(table)).unwrap()
}

/// Four trips. 2024-01-15 is a Monday; 2024-01-16 a Tuesday.
fn trips() -> DataFrame {
    let pickups: ArrayRef = Arc::new(TimestampNanosecondArray::from(vec![
        nanos("2024-01-15", "08:05:00"),
        nanos("2024-01-15", "08:40:00"),
        nanos("2024-01-16", "17:45:00"),
        nanos("2024-01-16", "18:10:00"),
    ]));
    let column = |values: ArrayRef| values;
    frame(vec![
        ("VendorID", column(Arc::new(Int64Array::from(vec![1, 2, 1, 2])))),
        ("tpep_pickup_datetime", pickups),
        ("passenger_count", column(Arc::new(Int64Array::from(vec![1, 1, 2, 3])))),
        ("trip_distance", column(Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 10.0])))),
        ("fare_amount", column(Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0, 140.0])))),
        ("tip_amount", column(Arc::new(Float64Array::from(vec![0.0, 4.0, 0.0, 6.0])))),
        ("total_amount", column(Arc::new(Float64Array::from(vec![12.0, 26.0, 32.0, 130.0])))),
        (
            "payment_type",
            column(Arc::new(StringArray::from(vec![
                "2 - Cash",
                "1 - Credit Card",
                "2 - Cash",
                "1 - Credit Card",
            ]))),
        ),
    ])
}

#[tokio::test]
async fn test_headline_metrics() -> TripLoaderResult<()> {
    let summary = TripSummary::compute(&trips()).await?;

    assert_eq!(summary.total_trips, 4);
    assert_relative_eq!(summary.average_fare.unwrap(), 50.0);
    assert_relative_eq!(summary.max_fare.unwrap(), 140.0);
    assert_relative_eq!(summary.average_distance.unwrap(), 4.0);
    assert_relative_eq!(summary.max_distance.unwrap(), 10.0);
    assert_relative_eq!(summary.median_distance.unwrap(), 2.5);
    assert_relative_eq!(summary.total_revenue.unwrap(), 200.0);
    assert_relative_eq!(summary.average_tip.unwrap(), 5.0);
    assert_relative_eq!(summary.tip_share.unwrap(), 5.0);
    assert_relative_eq!(summary.average_passengers.unwrap(), 1.75);
    assert_relative_eq!(summary.solo_trip_share.unwrap(), 50.0);
    assert_eq!(summary.modal_passengers, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_mode_ties_go_to_the_smallest_value() -> TripLoaderResult<()> {
    let summary = TripSummary::compute(&trips()).await?;

    // Two cash and two card trips.
    let (payment, share) = summary.top_payment_type.unwrap();
    assert_eq!(payment, "1 - Credit Card");
    assert_relative_eq!(share, 50.0);
    // Two pickups at 08:xx, one each at 17:xx and 18:xx.
    assert_eq!(summary.busiest_hour, Some(8));
    // Two trips on each day.
    assert_eq!(summary.busiest_weekday, Some(Weekday::Mon));
    Ok(())
}

#[tokio::test]
async fn test_insights() -> TripLoaderResult<()> {
    let insights = TripSummary::compute(&trips()).await?.insights();

    assert!(insights.contains(&"The average fare is $50.00 per trip".to_string()));
    assert!(insights.contains(&"The highest fare reached $140.00, likely an airport run".to_string()));
    assert!(insights.contains(&"Tips make up 5.0% of total revenue".to_string()));
    assert!(insights.contains(&"50.0% of trips carry a single passenger".to_string()));
    assert!(insights.contains(&"The busiest hour is 08:00".to_string()));
    assert!(insights.contains(&"Half of all trips are shorter than 2.50 miles (~4.00 km)".to_string()));
    assert!(insights.contains(&"Most trips carry 1 passenger".to_string()));
    assert!(insights.contains(&"The busiest day is Monday".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_missing_columns_leave_metrics_empty() -> TripLoaderResult<()> {
    let df = frame(vec![(
        "fare_amount",
        Arc::new(Float64Array::from(vec![8.0, 12.0])) as ArrayRef,
    )]);
    let summary = TripSummary::compute(&df).await?;

    assert_eq!(summary.total_trips, 2);
    assert_relative_eq!(summary.average_fare.unwrap(), 10.0);
    assert_eq!(summary.average_distance, None);
    assert_eq!(summary.tip_share, None);
    assert_eq!(summary.top_payment_type, None);
    assert_eq!(summary.busiest_hour, None);
    assert_eq!(summary.insights(), ["The average fare is $10.00 per trip"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_dataset() -> TripLoaderResult<()> {
    let empty = trips().limit(0, Some(0))?;
    let summary = TripSummary::compute(&empty).await?;

    assert_eq!(summary, TripSummary::default());
    assert!(summary.insights().is_empty());
    assert_eq!(DataPeriod::detect(&empty).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_data_period() -> TripLoaderResult<()> {
    let df = trips();
    assert_eq!(first_datetime_column(&df), Some("tpep_pickup_datetime".to_string()));

    let period = DataPeriod::detect(&df).await?.unwrap();
    assert_eq!(period.column, "tpep_pickup_datetime");
    assert_eq!(period.start, at("2024-01-15", "08:05:00"));
    assert_eq!(period.end, at("2024-01-16", "18:10:00"));
    assert_eq!(
        period.to_string(),
        "2024-01-15 to 2024-01-16 (tpep_pickup_datetime)"
    );
    Ok(())
}

#[tokio::test]
async fn test_no_datetime_column_means_no_period() -> TripLoaderResult<()> {
    let df = frame(vec![(
        "fare_amount",
        Arc::new(Float64Array::from(vec![8.0])) as ArrayRef,
    )]);
    assert_eq!(DataPeriod::detect(&df).await?, None);
    Ok(())
}
