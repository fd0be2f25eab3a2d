//! ## Descriptive Statistics
//!
//! Column-level figures behind the dashboard's charts and tables:
//!
//! - [`trips_per_day`] and [`trips_per_hour`]: trip counts over a datetime column.
//! - [`describe_numeric`]: count, mean, standard deviation, min, median, and max of every numeric
//!   column.
//! - [`value_counts`]: the most frequent values of a column, most frequent first.
//!
//! Every query ignores nulls in the column it groups or aggregates.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::transformers::filtering::days_to_date;
use crate::transformers::{column_type, is_numeric_type, is_temporal_type, is_text_type};
use chrono::NaiveDate;
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{avg, count, max, median, min, stddev};
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};
use datafusion_functions::datetime::date_part;

/// How many values [`value_counts`] reports by default.
pub const DEFAULT_TOP_VALUES: usize = 10;

pub(crate) fn scalar_to_f64(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Float64(v) => *v,
        ScalarValue::Float32(v) => v.map(f64::from),
        ScalarValue::Int64(v) => v.map(|n| n as f64),
        ScalarValue::Int32(v) => v.map(f64::from),
        ScalarValue::UInt64(v) => v.map(|n| n as f64),
        _ => None,
    }
}

pub(crate) fn scalar_to_i64(value: &ScalarValue) -> Option<i64> {
    match value {
        ScalarValue::Int8(v) => v.map(i64::from),
        ScalarValue::Int16(v) => v.map(i64::from),
        ScalarValue::Int32(v) => v.map(i64::from),
        ScalarValue::Int64(v) => *v,
        ScalarValue::Float64(v) => v.map(|f| f as i64),
        _ => None,
    }
}

fn to_count(value: &ScalarValue) -> usize {
    scalar_to_i64(value).map_or(0, |n| n.max(0) as usize)
}

/// Runs one aggregate query and returns each result as a float.
pub(crate) async fn aggregate_values(
    df: &DataFrame,
    aggregates: Vec<Expr>,
) -> TripLoaderResult<Vec<Option<f64>>> {
    let width = aggregates.len();
    let batches = df.clone().aggregate(vec![], aggregates)?.collect().await?;
    let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
        return Ok(vec![None; width]);
    };
    (0..width)
        .map(|i| Ok(scalar_to_f64(&ScalarValue::try_from_array(batch.column(i), 0)?)))
        .collect()
}

/// The `limit` most frequent non-null values of `key` with their counts. Ties go to the smallest
/// value.
pub(crate) async fn top_values(
    df: &DataFrame,
    key: Expr,
    limit: usize,
) -> TripLoaderResult<Vec<(ScalarValue, usize)>> {
    let batches = df
        .clone()
        .select(vec![key.alias("key")])?
        .filter(ident("key").is_not_null())?
        .aggregate(vec![ident("key")], vec![count(lit(1)).alias("n")])?
        .sort(vec![ident("n").sort(false, false), ident("key").sort(true, false)])?
        .limit(0, Some(limit))?
        .collect()
        .await?;

    let mut values = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let value = ScalarValue::try_from_array(batch.column(0), row)?;
            let n = ScalarValue::try_from_array(batch.column(1), row)?;
            values.push((value, to_count(&n)));
        }
    }
    Ok(values)
}

/// Counts of `key` per value, sorted by value.
async fn grouped_counts(
    df: &DataFrame,
    key: Expr,
) -> TripLoaderResult<Vec<(ScalarValue, usize)>> {
    let batches = df
        .clone()
        .select(vec![key.alias("key")])?
        .filter(ident("key").is_not_null())?
        .aggregate(vec![ident("key")], vec![count(lit(1)).alias("n")])?
        .sort(vec![ident("key").sort(true, false)])?
        .collect()
        .await?;

    let mut counts = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let value = ScalarValue::try_from_array(batch.column(0), row)?;
            let n = ScalarValue::try_from_array(batch.column(1), row)?;
            counts.push((value, to_count(&n)));
        }
    }
    Ok(counts)
}

fn require_datetime(df: &DataFrame, column: &str) -> TripLoaderResult<()> {
    let data_type = column_type(df, column)?;
    if !is_temporal_type(&data_type) {
        return Err(TripLoaderError::InvalidParameter(format!(
            "Column '{}' is not a datetime column (found {:?})",
            column, data_type
        )));
    }
    Ok(())
}

/// Number of trips on each calendar day of `column`, oldest day first.
pub async fn trips_per_day(
    df: &DataFrame,
    column: &str,
) -> TripLoaderResult<Vec<(NaiveDate, usize)>> {
    require_datetime(df, column)?;
    let counts = grouped_counts(df, cast(ident(column), DataType::Date32)).await?;
    Ok(counts
        .into_iter()
        .filter_map(|(day, n)| match day {
            ScalarValue::Date32(Some(days)) => days_to_date(days).map(|date| (date, n)),
            _ => None,
        })
        .collect())
}

/// Number of trips per hour of day (0-23) of `column`. Hours without trips are left out.
pub async fn trips_per_hour(df: &DataFrame, column: &str) -> TripLoaderResult<Vec<(u32, usize)>> {
    require_datetime(df, column)?;
    let hour = date_part().call(vec![lit("hour"), ident(column)]);
    let counts = grouped_counts(df, hour).await?;
    Ok(counts
        .into_iter()
        .filter_map(|(hour, n)| {
            scalar_to_i64(&hour)
                .and_then(|h| u32::try_from(h).ok())
                .map(|h| (h, n))
        })
        .collect())
}

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub column: String,
    /// Non-null values.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

const PROFILE_WIDTH: usize = 6;

/// One [`ColumnProfile`] per numeric column, in table order.
pub async fn describe_numeric(df: &DataFrame) -> TripLoaderResult<Vec<ColumnProfile>> {
    let columns: Vec<String> = df
        .schema()
        .fields()
        .iter()
        .filter(|f| is_numeric_type(f.data_type()))
        .map(|f| f.name().clone())
        .collect();
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut aggregates = Vec::with_capacity(columns.len() * PROFILE_WIDTH);
    for (i, name) in columns.iter().enumerate() {
        let value = cast(ident(name), DataType::Float64);
        aggregates.extend([
            count(ident(name)).alias(format!("count_{}", i)),
            avg(value.clone()).alias(format!("mean_{}", i)),
            stddev(value.clone()).alias(format!("std_{}", i)),
            min(value.clone()).alias(format!("min_{}", i)),
            median(value.clone()).alias(format!("median_{}", i)),
            max(value).alias(format!("max_{}", i)),
        ]);
    }
    let values = aggregate_values(df, aggregates).await?;

    Ok(columns
        .into_iter()
        .zip(values.chunks(PROFILE_WIDTH))
        .map(|(column, stats)| ColumnProfile {
            column,
            count: stats[0].map_or(0, |n| n as usize),
            mean: stats[1],
            std: stats[2],
            min: stats[3],
            median: stats[4],
            max: stats[5],
        })
        .collect())
}

/// Text columns, in table order. These are the ones [`value_counts`] is meant for.
pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .filter(|f| is_text_type(f.data_type()))
        .map(|f| f.name().clone())
        .collect()
}

/// The `limit` most frequent values of `column` as text, most frequent first.
pub async fn value_counts(
    df: &DataFrame,
    column: &str,
    limit: usize,
) -> TripLoaderResult<Vec<(String, usize)>> {
    column_type(df, column)?;
    let values = top_values(df, cast(ident(column), DataType::Utf8), limit).await?;
    Ok(values
        .into_iter()
        .filter_map(|(value, n)| match value {
            ScalarValue::Utf8(Some(text)) => Some((text, n)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(scalar_to_f64(&ScalarValue::Int32(Some(3))), Some(3.0));
        assert_eq!(scalar_to_f64(&ScalarValue::Utf8(Some("3".into()))), None);
        assert_eq!(scalar_to_i64(&ScalarValue::Int8(Some(-2))), Some(-2));
        assert_eq!(to_count(&ScalarValue::Int64(Some(-1))), 0);
        assert_eq!(to_count(&ScalarValue::Int64(None)), 0);
    }
}
