//! # Transformer Implementations
//!
//! The submodules contain the transformers used to clean and reshape trip data.
//!
//! - [`coercion`]: column type coercion (float re-parsing, integer downcasting, datetime parsing).
//! - [`deduplication`]: exact-duplicate row removal.
//! - [`dictionary`]: code-to-label mapping for the NYC taxi data dictionary.
//! - [`filtering`]: date, numeric, and categorical row filters.

pub mod coercion;
pub mod deduplication;
pub mod dictionary;
pub mod filtering;

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::DataFrame;

/// Validates that every column in `target_cols` exists in the DataFrame.
pub(crate) fn validate_columns(df: &DataFrame, target_cols: &[String]) -> TripLoaderResult<()> {
    for col_name in target_cols {
        column_type(df, col_name)?;
    }
    Ok(())
}

/// Returns the data type of a column, or a `MissingColumn` error.
pub(crate) fn column_type(df: &DataFrame, col_name: &str) -> TripLoaderResult<DataType> {
    df.schema()
        .field_with_name(None, col_name)
        .map(|field| field.data_type().clone())
        .map_err(|_| {
            TripLoaderError::MissingColumn(format!("Column '{}' not found in DataFrame", col_name))
        })
}

pub(crate) fn is_float_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Float16 | DataType::Float32 | DataType::Float64
    )
}

pub(crate) fn is_integer_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn is_numeric_type(data_type: &DataType) -> bool {
    is_float_type(data_type) || is_integer_type(data_type)
}

pub(crate) fn is_text_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

pub(crate) fn is_temporal_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
    )
}
