//! ## File Formats
//!
//! Picks a parser strictly from a file's extension and reads the file into a DataFrame.
//!
//! | Extension           | Parser                                   |
//! |---------------------|------------------------------------------|
//! | `.csv`              | DataFusion CSV reader (header row)       |
//! | `.parquet`          | DataFusion Parquet reader                |
//! | `.xlsx`, `.xls`     | calamine, first worksheet, header row    |
//!
//! Anything else is an `UnsupportedFormat` error; a reader failure is a `ParseError`.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use datafusion::prelude::{CsvReadOptions, DataFrame, ParquetReadOptions, SessionContext};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Tabular file formats the loader can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Csv,
    Parquet,
    /// Excel workbooks, both `.xlsx` and legacy `.xls`.
    Excel,
}

impl FileFormat {
    /// Maps an extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "parquet" => Some(FileFormat::Parquet),
            "xlsx" | "xls" => Some(FileFormat::Excel),
            _ => None,
        }
    }

    /// Resolves the format of a file from its name.
    pub fn from_path(path: &Path) -> TripLoaderResult<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                TripLoaderError::UnsupportedFormat(format!(
                    "'{}' is not a CSV, Parquet, or Excel file",
                    path.display()
                ))
            })
    }

    /// The extension used when naming a file of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Excel => "xlsx",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileFormat {
    type Err = TripLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| TripLoaderError::UnsupportedFormat(s.to_string()))
    }
}

fn parse_error(path: &Path, err: impl fmt::Display) -> TripLoaderError {
    TripLoaderError::ParseError(format!("{}: {}", path.display(), err))
}

/// Reads `path` with the parser its extension selects.
///
/// CSV and Parquet frames are lazy: rows are decoded when the frame is executed, so
/// malformed content may only surface then.
pub async fn read_table(ctx: &SessionContext, path: &Path) -> TripLoaderResult<DataFrame> {
    let format = FileFormat::from_path(path)?;
    let location = path.to_str().ok_or_else(|| {
        TripLoaderError::ParseError(format!("'{}' is not valid UTF-8", path.display()))
    })?;
    // The listing table filters by suffix, so pass the file's own (possibly upper-case) extension.
    let suffix = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    debug!("Reading {} as {:?}", path.display(), format);

    match format {
        FileFormat::Csv => ctx
            .read_csv(location, CsvReadOptions::new().file_extension(&suffix))
            .await
            .map_err(|e| parse_error(path, e)),
        FileFormat::Parquet => {
            let options = ParquetReadOptions {
                file_extension: &suffix,
                ..Default::default()
            };
            ctx.read_parquet(location, options)
                .await
                .map_err(|e| parse_error(path, e))
        }
        FileFormat::Excel => {
            let batch = read_spreadsheet(path)?;
            ctx.read_batch(batch).map_err(|e| parse_error(path, e))
        }
    }
}

/// Reads the first worksheet of a workbook into a single record batch.
pub fn read_spreadsheet(path: &Path) -> TripLoaderResult<RecordBatch> {
    let mut workbook = open_workbook_auto(path).map_err(|e| parse_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_error(path, "workbook has no worksheets"))?
        .map_err(|e| parse_error(path, e))?;
    range_to_batch(&range).map_err(|e| parse_error(path, e))
}

#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        other => match other.as_datetime() {
            Some(dt) => CellValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Text(other.to_string()),
        },
    }
}

/// `i64::MAX as f64` rounds up to 2^63, which is already out of range.
fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Builds one column. Integer-valued columns become Int64, other numeric columns Float64,
/// and anything mixing in text becomes Utf8.
fn build_column(values: &[CellValue]) -> (DataType, ArrayRef) {
    let mut numeric = true;
    let mut integral = true;
    let mut any = false;
    for value in values {
        match value {
            CellValue::Empty => {}
            CellValue::Int(_) => any = true,
            CellValue::Float(f) => {
                any = true;
                integral &= is_integral(*f);
            }
            CellValue::Text(_) => {
                any = true;
                numeric = false;
            }
        }
    }

    if any && numeric && integral {
        let array: Int64Array = values
            .iter()
            .map(|v| match v {
                CellValue::Int(i) => Some(*i),
                CellValue::Float(f) => Some(*f as i64),
                _ => None,
            })
            .collect();
        (DataType::Int64, Arc::new(array))
    } else if any && numeric {
        let array: Float64Array = values
            .iter()
            .map(|v| match v {
                CellValue::Int(i) => Some(*i as f64),
                CellValue::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        (DataType::Float64, Arc::new(array))
    } else {
        let array: StringArray = values
            .iter()
            .map(|v| match v {
                CellValue::Empty => None,
                CellValue::Int(i) => Some(i.to_string()),
                CellValue::Float(f) => Some(f.to_string()),
                CellValue::Text(s) => Some(s.clone()),
            })
            .collect();
        (DataType::Utf8, Arc::new(array))
    }
}

/// Header cells become column names; blanks get `column_<n>` and repeats get a numeric suffix.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let raw = cell.to_string();
            let base = if raw.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                raw.trim().to_string()
            };
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn range_to_batch(range: &Range<Data>) -> Result<RecordBatch, arrow::error::ArrowError> {
    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| {
        arrow::error::ArrowError::InvalidArgumentError("worksheet is empty".to_string())
    })?;
    let names = header_names(header);
    let body: Vec<&[Data]> = rows.collect();

    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for (j, name) in names.iter().enumerate() {
        let values: Vec<CellValue> = body
            .iter()
            .map(|row| row.get(j).map_or(CellValue::Empty, cell_value))
            .collect();
        let (data_type, array) = build_column(&values);
        fields.push(Field::new(name, data_type, true));
        columns.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}
