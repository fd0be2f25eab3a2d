//! ## Trip Summary
//!
//! Headline figures for a cleaned trip table: volumes, fares, distances, tips, passengers,
//! the dominant payment type, and the busiest hour and weekday. Each figure that depends on a
//! column is `None` when that column is absent or holds no values, so partial datasets still
//! summarize.
//!
//! [`DataPeriod::detect`] reports the time span covered by the first datetime column.

use crate::exceptions::TripLoaderResult;
use crate::statistics::{aggregate_values, scalar_to_i64, top_values};
use crate::transformers::coercion::TIMESTAMP_TYPE;
use crate::transformers::{is_numeric_type, is_temporal_type};
use chrono::{DateTime, NaiveDateTime, Weekday};
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{avg, max, median, min, sum};
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};
use datafusion_functions::datetime::date_part;
use std::fmt;

pub const FARE_COLUMN: &str = "fare_amount";
pub const DISTANCE_COLUMN: &str = "trip_distance";
pub const TOTAL_COLUMN: &str = "total_amount";
pub const TIP_COLUMN: &str = "tip_amount";
pub const PASSENGER_COLUMN: &str = "passenger_count";
pub const PAYMENT_COLUMN: &str = "payment_type";

/// Fares above this are called out in the insights.
const NOTABLE_FARE: f64 = 100.0;

const KM_PER_MILE: f64 = 1.6;

/// Headline metrics of a trip table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripSummary {
    pub total_trips: usize,
    pub average_fare: Option<f64>,
    pub max_fare: Option<f64>,
    /// Miles.
    pub average_distance: Option<f64>,
    pub max_distance: Option<f64>,
    pub median_distance: Option<f64>,
    /// Sum of `total_amount`.
    pub total_revenue: Option<f64>,
    /// Mean tip over the trips that tipped.
    pub average_tip: Option<f64>,
    /// Tips as a percentage of total revenue.
    pub tip_share: Option<f64>,
    pub average_passengers: Option<f64>,
    /// Most common passenger count.
    pub modal_passengers: Option<i64>,
    /// Percentage of trips with exactly one passenger.
    pub solo_trip_share: Option<f64>,
    /// Most common payment type and its percentage of all trips.
    pub top_payment_type: Option<(String, f64)>,
    /// Hour of day (0-23) with the most pickups in the first datetime column.
    pub busiest_hour: Option<u32>,
    pub busiest_weekday: Option<Weekday>,
}

fn has_numeric(df: &DataFrame, name: &str) -> bool {
    df.schema()
        .field_with_name(None, name)
        .map(|f| is_numeric_type(f.data_type()))
        .unwrap_or(false)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().field_with_name(None, name).is_ok()
}

/// First column with a datetime type, in table order.
pub fn first_datetime_column(df: &DataFrame) -> Option<String> {
    df.schema()
        .fields()
        .iter()
        .find(|f| is_temporal_type(f.data_type()))
        .map(|f| f.name().clone())
}

fn as_f64(name: &str) -> Expr {
    cast(ident(name), DataType::Float64)
}

/// Most frequent non-null value of `key` with its count. Ties go to the smallest value.
async fn mode(df: &DataFrame, key: Expr) -> TripLoaderResult<Option<(ScalarValue, usize)>> {
    Ok(top_values(df, key, 1).await?.into_iter().next())
}

fn weekday_from_sunday(days: i64) -> Option<Weekday> {
    match days {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn percent(part: f64, whole: f64) -> Option<f64> {
    (whole > 0.0).then(|| part / whole * 100.0)
}

impl TripSummary {
    /// Computes every metric the table has the columns for.
    pub async fn compute(df: &DataFrame) -> TripLoaderResult<Self> {
        let total_trips = df.clone().count().await?;
        let mut summary = TripSummary {
            total_trips,
            ..Default::default()
        };
        if total_trips == 0 {
            return Ok(summary);
        }
        let trips = total_trips as f64;

        if has_numeric(df, FARE_COLUMN) {
            let values = aggregate_values(
                df,
                vec![avg(as_f64(FARE_COLUMN)), max(as_f64(FARE_COLUMN))],
            )
            .await?;
            summary.average_fare = values[0];
            summary.max_fare = values[1];
        }

        if has_numeric(df, DISTANCE_COLUMN) {
            let values = aggregate_values(
                df,
                vec![
                    avg(as_f64(DISTANCE_COLUMN)),
                    max(as_f64(DISTANCE_COLUMN)),
                    median(as_f64(DISTANCE_COLUMN)),
                ],
            )
            .await?;
            summary.average_distance = values[0];
            summary.max_distance = values[1];
            summary.median_distance = values[2];
        }

        if has_numeric(df, TOTAL_COLUMN) {
            summary.total_revenue = aggregate_values(df, vec![sum(as_f64(TOTAL_COLUMN))]).await?[0];
        }

        if has_numeric(df, TIP_COLUMN) {
            let tipped = df.clone().filter(as_f64(TIP_COLUMN).gt(lit(0.0)))?;
            summary.average_tip = aggregate_values(&tipped, vec![avg(as_f64(TIP_COLUMN))]).await?[0];
            if summary.average_tip.is_some() {
                let tips = aggregate_values(df, vec![sum(as_f64(TIP_COLUMN))]).await?[0];
                summary.tip_share = tips
                    .zip(summary.total_revenue)
                    .and_then(|(tips, revenue)| percent(tips, revenue))
                    .filter(|share| *share > 0.0);
            }
        }

        if has_numeric(df, PASSENGER_COLUMN) {
            summary.average_passengers =
                aggregate_values(df, vec![avg(as_f64(PASSENGER_COLUMN))]).await?[0];
            let solo = df
                .clone()
                .filter(as_f64(PASSENGER_COLUMN).eq(lit(1.0)))?
                .count()
                .await?;
            summary.solo_trip_share = percent(solo as f64, trips);
            summary.modal_passengers = mode(df, ident(PASSENGER_COLUMN))
                .await?
                .and_then(|(value, _)| scalar_to_i64(&value));
        }

        if has_column(df, PAYMENT_COLUMN) {
            let top = mode(df, cast(ident(PAYMENT_COLUMN), DataType::Utf8)).await?;
            summary.top_payment_type = match top {
                Some((ScalarValue::Utf8(Some(label)), n)) => {
                    percent(n as f64, trips).map(|share| (label, share))
                }
                _ => None,
            };
        }

        if let Some(column) = first_datetime_column(df) {
            let hour = date_part().call(vec![lit("hour"), ident(&column)]);
            summary.busiest_hour = mode(df, hour)
                .await?
                .and_then(|(value, _)| scalar_to_i64(&value))
                .and_then(|h| u32::try_from(h).ok());

            let dow = date_part().call(vec![lit("dow"), ident(&column)]);
            summary.busiest_weekday = mode(df, dow)
                .await?
                .and_then(|(value, _)| scalar_to_i64(&value))
                .and_then(weekday_from_sunday);
        }

        Ok(summary)
    }

    /// One short sentence per available metric, for display next to the charts.
    pub fn insights(&self) -> Vec<String> {
        let mut insights = Vec::new();

        if let (Some(avg), Some(max)) = (self.average_distance, self.max_distance) {
            insights.push(format!(
                "The average trip covers {:.2} miles (~{:.2} km)",
                avg,
                avg * KM_PER_MILE
            ));
            insights.push(format!(
                "The longest trip covers {:.2} miles (~{:.2} km)",
                max,
                max * KM_PER_MILE
            ));
        }
        if let Some(median) = self.median_distance {
            insights.push(format!(
                "Half of all trips are shorter than {:.2} miles (~{:.2} km)",
                median,
                median * KM_PER_MILE
            ));
        }
        if let Some(avg) = self.average_fare {
            insights.push(format!("The average fare is ${:.2} per trip", avg));
        }
        if let Some(max) = self.max_fare.filter(|m| *m > NOTABLE_FARE) {
            insights.push(format!("The highest fare reached ${:.2}, likely an airport run", max));
        }
        if let Some(tip) = self.average_tip.filter(|t| *t > 0.0) {
            insights.push(format!("Tipping riders leave ${:.2} on average", tip));
            if let Some(share) = self.tip_share {
                insights.push(format!("Tips make up {:.1}% of total revenue", share));
            }
        }
        if let Some(avg) = self.average_passengers {
            insights.push(format!("Trips carry {:.1} passengers on average", avg));
        }
        if let Some(passengers) = self.modal_passengers {
            let noun = if passengers == 1 { "passenger" } else { "passengers" };
            insights.push(format!("Most trips carry {} {}", passengers, noun));
        }
        if let Some(share) = self.solo_trip_share {
            insights.push(format!("{:.1}% of trips carry a single passenger", share));
        }
        if let Some((payment, share)) = &self.top_payment_type {
            insights.push(format!(
                "The most common payment type is {} ({:.1}%)",
                payment, share
            ));
        }
        if let Some(hour) = self.busiest_hour {
            insights.push(format!("The busiest hour is {:02}:00", hour));
        }
        if let Some(day) = self.busiest_weekday {
            insights.push(format!("The busiest day is {}", weekday_name(day)));
        }
        insights
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// The time span a dataset covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPeriod {
    /// The datetime column the span was read from.
    pub column: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl fmt::Display for DataPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {} ({})",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.column
        )
    }
}

impl DataPeriod {
    /// Min and max of the first datetime column, or `None` when there is no such column or it
    /// holds only nulls.
    pub async fn detect(df: &DataFrame) -> TripLoaderResult<Option<Self>> {
        let Some(column) = first_datetime_column(df) else {
            return Ok(None);
        };
        let value = cast(ident(&column), TIMESTAMP_TYPE);
        let batches = df
            .clone()
            .aggregate(
                vec![],
                vec![min(value.clone()).alias("start"), max(value).alias("end")],
            )?
            .collect()
            .await?;
        let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
            return Ok(None);
        };
        let start = ScalarValue::try_from_array(batch.column(0), 0)?;
        let end = ScalarValue::try_from_array(batch.column(1), 0)?;
        match (start, end) {
            (
                ScalarValue::TimestampNanosecond(Some(start), _),
                ScalarValue::TimestampNanosecond(Some(end), _),
            ) => Ok(Some(DataPeriod {
                column,
                start: DateTime::from_timestamp_nanos(start).naive_utc(),
                end: DateTime::from_timestamp_nanos(end).naive_utc(),
            })),
            _ => Ok(None),
        }
    }
}
