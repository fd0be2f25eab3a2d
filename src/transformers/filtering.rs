//! ## Row Filters
//!
//! Filters used to narrow a trip dataset down for exploration.
//!
//! ### Available Transformers
//!
//! - [`DateRangeFilter`]: Keeps rows whose date falls within an inclusive date range.
//! - [`NumericRangeFilter`]: Keeps rows whose value falls within an inclusive numeric range.
//! - [`CategoryFilter`]: Keeps rows whose value is one of a set of categories.
//!
//! [`date_bounds`] and [`column_range`] compute the natural bounds of a column, which callers use
//! as the default range of a filter.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::impl_transformer;
use crate::transformers::{column_type, is_numeric_type, is_temporal_type};
use chrono::{Datelike, NaiveDate};
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};

/// `NaiveDate::from_ymd(1970, 1, 1).num_days_from_ce()`
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

fn validate_datetime_column(df: &DataFrame, col_name: &str) -> TripLoaderResult<()> {
    match column_type(df, col_name)? {
        dt if is_temporal_type(&dt) => Ok(()),
        dt => Err(TripLoaderError::InvalidParameter(format!(
            "Column '{}' must be a datetime type (Timestamp, Date32, or Date64), but found {:?}",
            col_name, dt
        ))),
    }
}

fn validate_numeric_column(df: &DataFrame, col_name: &str) -> TripLoaderResult<()> {
    match column_type(df, col_name)? {
        dt if is_numeric_type(&dt) => Ok(()),
        dt => Err(TripLoaderError::InvalidParameter(format!(
            "Column '{}' must be numeric, but found {:?}",
            col_name, dt
        ))),
    }
}

/// Keeps rows whose date part lies in `[start, end]`.
pub struct DateRangeFilter {
    pub column: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRangeFilter {
    pub fn new(column: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            column: column.into(),
            start,
            end,
        }
    }

    /// Stateless transformer: fit only validates the parameters.
    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()> {
        self.validate(df)
    }

    fn validate(&self, df: &DataFrame) -> TripLoaderResult<()> {
        if self.start > self.end {
            return Err(TripLoaderError::InvalidParameter(format!(
                "Start date {} is after end date {}",
                self.start, self.end
            )));
        }
        validate_datetime_column(df, &self.column)
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        self.validate(&df)?;
        let day = cast(ident(&self.column), DataType::Date32);
        let predicate = day.between(
            lit(ScalarValue::Date32(Some(date_to_days(self.start)))),
            lit(ScalarValue::Date32(Some(date_to_days(self.end)))),
        );
        df.filter(predicate).map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Keeps rows whose value lies in `[min, max]`. Nulls are dropped.
pub struct NumericRangeFilter {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl NumericRangeFilter {
    pub fn new(column: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            column: column.into(),
            min,
            max,
        }
    }

    /// Stateless transformer: fit only validates the parameters.
    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()> {
        self.validate(df)
    }

    fn validate(&self, df: &DataFrame) -> TripLoaderResult<()> {
        if !(self.min <= self.max) {
            return Err(TripLoaderError::InvalidParameter(format!(
                "Range [{}, {}] is empty",
                self.min, self.max
            )));
        }
        validate_numeric_column(df, &self.column)
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        self.validate(&df)?;
        let value = cast(ident(&self.column), DataType::Float64);
        df.filter(value.between(lit(self.min), lit(self.max)))
            .map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Keeps rows whose value, in text form, is one of `values`. An empty set keeps every row.
pub struct CategoryFilter {
    pub column: String,
    pub values: Vec<String>,
}

impl CategoryFilter {
    pub fn new(column: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            column: column.into(),
            values,
        }
    }

    /// Stateless transformer: fit only validates the column.
    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()> {
        column_type(df, &self.column).map(|_| ())
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        column_type(&df, &self.column)?;
        if self.values.is_empty() {
            return Ok(df);
        }
        let list: Vec<Expr> = self.values.iter().map(|v| lit(v.clone())).collect();
        let value = cast(ident(&self.column), DataType::Utf8);
        df.filter(value.in_list(list, false))
            .map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(DateRangeFilter);
impl_transformer!(NumericRangeFilter);
impl_transformer!(CategoryFilter);

/// First and last date in a datetime column, or `None` if it holds no values.
pub async fn date_bounds(
    df: &DataFrame,
    col_name: &str,
) -> TripLoaderResult<Option<(NaiveDate, NaiveDate)>> {
    validate_datetime_column(df, col_name)?;
    let day = cast(ident(col_name), DataType::Date32);
    let batches = df
        .clone()
        .aggregate(
            vec![],
            vec![min(day.clone()).alias("lo"), max(day).alias("hi")],
        )?
        .collect()
        .await?;
    let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let lo = ScalarValue::try_from_array(batch.column(0), 0)?;
    let hi = ScalarValue::try_from_array(batch.column(1), 0)?;
    match (lo, hi) {
        (ScalarValue::Date32(Some(lo)), ScalarValue::Date32(Some(hi))) => {
            Ok(days_to_date(lo).zip(days_to_date(hi)))
        }
        _ => Ok(None),
    }
}

/// Minimum and maximum of a numeric column, or `None` if it holds no values.
pub async fn column_range(df: &DataFrame, col_name: &str) -> TripLoaderResult<Option<(f64, f64)>> {
    validate_numeric_column(df, col_name)?;
    let value = cast(ident(col_name), DataType::Float64);
    let batches = df
        .clone()
        .aggregate(
            vec![],
            vec![min(value.clone()).alias("lo"), max(value).alias("hi")],
        )?
        .collect()
        .await?;
    let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let lo = ScalarValue::try_from_array(batch.column(0), 0)?;
    let hi = ScalarValue::try_from_array(batch.column(1), 0)?;
    match (lo, hi) {
        (ScalarValue::Float64(Some(lo)), ScalarValue::Float64(Some(hi))) => Ok(Some((lo, hi))),
        _ => Ok(None),
    }
}
