//! ## Column Type Coercion
//!
//! This module provides the transformers that give raw trip columns stable types.
//!
//! ### Available Transformers
//!
//! - [`TypeCoercion`]: Re-parses columns into the type their [`ColumnKind`] calls for. Values that do
//!   not parse become null; coercion never fails on a value.
//! - [`IntegerDowncast`]: Narrows integer columns to the smallest signed width (Int8, Int16, Int32,
//!   or Int64) that holds the observed minimum and maximum.
//!
//! Both transformers are stable under re-application: coercing an already coerced column is a no-op.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::impl_transformer;
use crate::transformers::{
    column_type, is_float_type, is_integer_type, is_temporal_type, is_text_type, validate_columns,
};
use datafusion::arrow::datatypes::{DataType, TimeUnit};
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion::logical_expr::Case as DFCase;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, try_cast, Expr};
use datafusion_functions::math;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Type all parsed datetime columns end up with.
pub const TIMESTAMP_TYPE: DataType = DataType::Timestamp(TimeUnit::Nanosecond, None);

/// The coercion target of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Re-parsed as Float64.
    Float,
    /// Re-parsed as Int64, then narrowed by [`IntegerDowncast`].
    Integer,
    /// Text parsed as `Timestamp(Nanosecond)`; temporal columns are kept as they are.
    Datetime,
    /// Left unchanged.
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Float => "float",
            ColumnKind::Integer => "integer",
            ColumnKind::Datetime => "datetime",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

impl ColumnKind {
    /// Whether a column of `data_type` can be coerced to this kind.
    ///
    /// Only text can be parsed into datetimes; numbers are never reinterpreted as epoch offsets.
    pub fn applies_to(&self, data_type: &DataType) -> bool {
        match self {
            ColumnKind::Datetime => is_text_type(data_type) || is_temporal_type(data_type),
            _ => true,
        }
    }
}

/// Builds the expression that coerces one column, or `None` when the column is already in shape.
fn coerce_expr(name: &str, data_type: &DataType, kind: ColumnKind) -> Option<Expr> {
    match kind {
        ColumnKind::Float if *data_type == DataType::Float64 => None,
        ColumnKind::Float => Some(try_cast(ident(name), DataType::Float64)),
        ColumnKind::Integer if is_integer_type(data_type) => None,
        ColumnKind::Integer if is_float_type(data_type) => {
            // Fractional values have no integer representation; they become null instead of
            // being truncated.
            let whole = ident(name).eq(math::trunc().call(vec![ident(name)]));
            Some(Expr::Case(DFCase {
                expr: None,
                when_then_expr: vec![(
                    Box::new(whole),
                    Box::new(try_cast(ident(name), DataType::Int64)),
                )],
                else_expr: Some(Box::new(lit(ScalarValue::Int64(None)))),
            }))
        }
        ColumnKind::Integer => Some(try_cast(ident(name), DataType::Int64)),
        ColumnKind::Datetime if is_text_type(data_type) => {
            Some(try_cast(ident(name), TIMESTAMP_TYPE))
        }
        ColumnKind::Datetime | ColumnKind::Text => None,
    }
}

/// Re-parses columns into the types their kinds call for. Stateless.
pub struct TypeCoercion {
    pub columns: Vec<(String, ColumnKind)>,
}

impl TypeCoercion {
    pub fn new(columns: Vec<(String, ColumnKind)>) -> Self {
        Self { columns }
    }

    /// Stateless transformer: fit only validates the target columns.
    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()> {
        let names: Vec<String> = self.columns.iter().map(|(n, _)| n.clone()).collect();
        validate_columns(df, &names)
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        let targets: HashMap<&str, ColumnKind> = self
            .columns
            .iter()
            .map(|(name, kind)| (name.as_str(), *kind))
            .collect();
        for name in targets.keys() {
            column_type(&df, name)?;
        }

        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                targets
                    .get(name.as_str())
                    .and_then(|kind| coerce_expr(name, field.data_type(), *kind))
                    .map(|expr| expr.alias(name))
                    .unwrap_or_else(|| ident(name))
            })
            .collect();
        df.select(exprs).map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

fn scalar_to_i128(value: &ScalarValue) -> Option<i128> {
    match value {
        ScalarValue::Int8(Some(v)) => Some(*v as i128),
        ScalarValue::Int16(Some(v)) => Some(*v as i128),
        ScalarValue::Int32(Some(v)) => Some(*v as i128),
        ScalarValue::Int64(Some(v)) => Some(*v as i128),
        ScalarValue::UInt8(Some(v)) => Some(*v as i128),
        ScalarValue::UInt16(Some(v)) => Some(*v as i128),
        ScalarValue::UInt32(Some(v)) => Some(*v as i128),
        ScalarValue::UInt64(Some(v)) => Some(*v as i128),
        _ => None,
    }
}

/// Smallest signed integer type holding every value in `[min, max]`.
pub fn smallest_signed_type(min: i128, max: i128) -> Option<DataType> {
    let widths = [
        (DataType::Int8, i8::MIN as i128, i8::MAX as i128),
        (DataType::Int16, i16::MIN as i128, i16::MAX as i128),
        (DataType::Int32, i32::MIN as i128, i32::MAX as i128),
        (DataType::Int64, i64::MIN as i128, i64::MAX as i128),
    ];
    widths
        .into_iter()
        .find(|(_, lo, hi)| min >= *lo && max <= *hi)
        .map(|(data_type, _, _)| data_type)
}

/// Narrows integer columns to the smallest signed width that holds their values.
///
/// Fitting runs one aggregate query for the min and max of every target column. All-null
/// columns and columns too wide for Int64 keep their type.
pub struct IntegerDowncast {
    pub columns: Vec<String>,
    pub target_types: HashMap<String, DataType>,
    fitted: bool,
}

impl IntegerDowncast {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            target_types: HashMap::new(),
            fitted: false,
        }
    }

    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()> {
        validate_columns(df, &self.columns)?;
        self.target_types.clear();

        let mut aggregates = Vec::with_capacity(self.columns.len() * 2);
        for (i, col_name) in self.columns.iter().enumerate() {
            let data_type = column_type(df, col_name)?;
            if !is_integer_type(&data_type) {
                return Err(TripLoaderError::InvalidParameter(format!(
                    "Column '{}' must be an integer type to downcast, but found {:?}",
                    col_name, data_type
                )));
            }
            aggregates.push(min(ident(col_name)).alias(format!("min_{}", i)));
            aggregates.push(max(ident(col_name)).alias(format!("max_{}", i)));
        }

        if !aggregates.is_empty() {
            let batches = df.clone().aggregate(vec![], aggregates)?.collect().await?;
            if let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) {
                for (i, col_name) in self.columns.iter().enumerate() {
                    let lo = ScalarValue::try_from_array(batch.column(2 * i), 0)?;
                    let hi = ScalarValue::try_from_array(batch.column(2 * i + 1), 0)?;
                    let width = scalar_to_i128(&lo)
                        .zip(scalar_to_i128(&hi))
                        .and_then(|(lo, hi)| smallest_signed_type(lo, hi));
                    match width {
                        Some(data_type) => {
                            debug!("Column '{}' narrows to {:?}", col_name, data_type);
                            self.target_types.insert(col_name.clone(), data_type);
                        }
                        None => debug!("Column '{}' keeps its integer type", col_name),
                    }
                }
            }
        }
        self.fitted = true;
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        if !self.fitted {
            return Err(TripLoaderError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.target_types.get(name) {
                    Some(target) if target != field.data_type() => {
                        cast(ident(name), target.clone()).alias(name)
                    }
                    _ => ident(name),
                }
            })
            .collect();
        df.select(exprs).map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(TypeCoercion);
impl_transformer!(IntegerDowncast);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smallest_signed_type() {
        assert_eq!(smallest_signed_type(0, 6), Some(DataType::Int8));
        assert_eq!(smallest_signed_type(-129, 0), Some(DataType::Int16));
        assert_eq!(smallest_signed_type(0, 40_000), Some(DataType::Int32));
        assert_eq!(
            smallest_signed_type(0, i32::MAX as i128 + 1),
            Some(DataType::Int64)
        );
        assert_eq!(smallest_signed_type(0, u64::MAX as i128), None);
    }

    #[test]
    fn test_datetime_applies_only_to_text_and_temporal() {
        assert!(ColumnKind::Datetime.applies_to(&DataType::Utf8));
        assert!(ColumnKind::Datetime.applies_to(&TIMESTAMP_TYPE));
        assert!(!ColumnKind::Datetime.applies_to(&DataType::Int64));
        assert!(ColumnKind::Float.applies_to(&DataType::Utf8));
    }

    #[test]
    fn test_coerce_expr_noops() {
        assert!(coerce_expr("x", &DataType::Float64, ColumnKind::Float).is_none());
        assert!(coerce_expr("x", &DataType::Int8, ColumnKind::Integer).is_none());
        assert!(coerce_expr("x", &TIMESTAMP_TYPE, ColumnKind::Datetime).is_none());
        assert!(coerce_expr("x", &DataType::Utf8, ColumnKind::Text).is_none());
        assert!(coerce_expr("x", &DataType::Utf8, ColumnKind::Datetime).is_some());
        assert!(coerce_expr("x", &DataType::Float32, ColumnKind::Float).is_some());
    }
}
