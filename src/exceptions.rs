//! ## Custom Errors for Trip Loader
//!
//! This module defines the error types used across the library.
//! It uses the `thiserror` crate to derive the `Error` trait for custom error types.
//! The `TripLoaderError` enum covers the failures of fetching, parsing, cleaning, and
//! filtering a trip dataset, and [`FailureKind`] groups them into the four outcomes a caller
//! reports back to the user.
//!
//! The `TripLoaderResult` type alias simplifies error handling by providing a convenient
//! alias for results returned by the library.
//!
//! ### Example
//!
//! ```rust
//! use trip_loader::exceptions::{FailureKind, TripLoaderError, TripLoaderResult};
//!
//! fn resolve(link: &str) -> TripLoaderResult<()> {
//!     Err(TripLoaderError::InvalidReference(link.into()))
//! }
//!
//! let err = resolve("not-a-url").unwrap_err();
//! assert_eq!(err.failure_kind(), FailureKind::InvalidReference);
//! ```

use std::fmt;
use thiserror::Error;

/// Errors specific to the Trip Loader library.
#[derive(Debug, Error)]
pub enum TripLoaderError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Wraps errors from the HTTP client.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Wraps errors from the spreadsheet reader.
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    /// The link does not contain a resource id in any of the known forms.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The transfer failed, returned a non-success status, or left no file behind.
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Indicates that the provided data format is unsupported (e.g., unknown file extension).
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file exists but is not valid for the format its extension claims.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Indicates that an invalid parameter was provided (e.g., unsupported value or incorrect data type).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,
}

/// The four ways a load can fail, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidReference,
    DownloadError,
    UnsupportedFormat,
    ParseError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::InvalidReference => "invalid reference",
            FailureKind::DownloadError => "download error",
            FailureKind::UnsupportedFormat => "unsupported format",
            FailureKind::ParseError => "parse error",
        };
        f.write_str(name)
    }
}

impl TripLoaderError {
    /// Groups the error into the outcome reported by a failed load.
    ///
    /// Transport and filesystem failures count as download errors; everything raised while
    /// reading or reshaping the table counts as a parse error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TripLoaderError::InvalidReference(_) => FailureKind::InvalidReference,
            TripLoaderError::DownloadError(_)
            | TripLoaderError::HttpError(_)
            | TripLoaderError::IoError(_) => FailureKind::DownloadError,
            TripLoaderError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            TripLoaderError::DataFusionError(_)
            | TripLoaderError::ArrowError(_)
            | TripLoaderError::ParquetError(_)
            | TripLoaderError::SpreadsheetError(_)
            | TripLoaderError::ParseError(_)
            | TripLoaderError::InvalidParameter(_)
            | TripLoaderError::MissingColumn(_)
            | TripLoaderError::FitNotCalled => FailureKind::ParseError,
        }
    }
}

/// A convenient result type for Trip Loader operations.
pub type TripLoaderResult<T> = std::result::Result<T, TripLoaderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test io error");
        let err: TripLoaderError = io_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("I/O error:"));
        assert!(err_msg.contains("test io error"));
        assert_eq!(err.failure_kind(), FailureKind::DownloadError);
    }

    #[test]
    fn test_datafusion_error() {
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: TripLoaderError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
        assert_eq!(err.failure_kind(), FailureKind::ParseError);
    }

    #[test]
    fn test_arrow_error() {
        let arrow_err = arrow::error::ArrowError::ComputeError("test compute error".into());
        let err: TripLoaderError = arrow_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Arrow error:"));
        assert!(err_msg.contains("test compute error"));
    }

    #[test]
    fn test_parquet_error() {
        let parquet_err = parquet::errors::ParquetError::General("test parquet error".into());
        let err: TripLoaderError = parquet_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Parquet error:"));
        assert!(err_msg.contains("test parquet error"));
    }

    #[test]
    fn test_invalid_reference_error() {
        let err = TripLoaderError::InvalidReference("not-a-url".into());
        assert_eq!(err.to_string(), "Invalid reference: not-a-url");
        assert_eq!(err.failure_kind(), FailureKind::InvalidReference);
    }

    #[test]
    fn test_download_error() {
        let err = TripLoaderError::DownloadError("HTTP 403".into());
        assert!(err.to_string().contains("Download error:"));
        assert_eq!(err.failure_kind(), FailureKind::DownloadError);
    }

    #[test]
    fn test_unsupported_format_error() {
        let err = TripLoaderError::UnsupportedFormat("data.json".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Unsupported format:"));
        assert!(err_msg.contains("data.json"));
        assert_eq!(err.failure_kind(), FailureKind::UnsupportedFormat);
    }

    #[test]
    fn test_missing_column_error() {
        let err = TripLoaderError::MissingColumn("fare_amount".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Missing column:"));
        assert!(err_msg.contains("fare_amount"));
    }

    #[test]
    fn test_fit_not_called_error() {
        let err = TripLoaderError::FitNotCalled;
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Transform called before fit for stateful transformer"));
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::UnsupportedFormat.to_string(), "unsupported format");
        assert_eq!(FailureKind::InvalidReference.to_string(), "invalid reference");
    }
}
