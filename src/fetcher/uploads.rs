//! ## Uploaded Files
//!
//! Reads several in-memory uploads one after another and concatenates them into one table,
//! matching columns by name. Only `.csv` and `.parquet` uploads are accepted. A file with another
//! extension, a file that fails to parse, or a file whose columns cannot be merged with the files
//! before it is skipped with a warning; the remaining files are still combined.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::fetcher::formats::{read_table, FileFormat};
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::{DataFrame, SessionContext};
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};
use std::path::Path;
use tracing::{debug, info, warn};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An upload that made it into the combined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub name: String,
    pub rows: usize,
}

/// An upload that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUpload {
    pub name: String,
    pub reason: String,
}

/// The concatenated table plus a per-file account.
#[derive(Debug, Clone)]
pub struct CombinedUpload {
    pub frame: DataFrame,
    pub accepted: Vec<AcceptedUpload>,
    pub skipped: Vec<SkippedUpload>,
}

impl CombinedUpload {
    pub fn total_rows(&self) -> usize {
        self.accepted.iter().map(|a| a.rows).sum()
    }
}

fn upload_format(name: &str) -> Option<FileFormat> {
    match FileFormat::from_path(Path::new(name)) {
        Ok(format @ (FileFormat::Csv | FileFormat::Parquet)) => Some(format),
        _ => None,
    }
}

/// Parses one upload through a scratch file and materializes it before the file goes away.
async fn read_upload(ctx: &SessionContext, upload: &Upload) -> TripLoaderResult<(DataFrame, usize)> {
    let extension = Path::new(&upload.name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let scratch = tempfile::Builder::new()
        .prefix("trip-upload-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    tokio::fs::write(scratch.path(), &upload.bytes).await?;

    let frame = read_table(ctx, scratch.path()).await?;
    let frame = frame
        .cache()
        .await
        .map_err(|e| TripLoaderError::ParseError(format!("{}: {}", upload.name, e)))?;
    let rows = frame.clone().count().await?;
    Ok((frame, rows))
}

/// Projects `frame` onto `columns`, filling the columns it lacks with typed nulls.
fn align(frame: DataFrame, columns: &[(String, DataType)]) -> TripLoaderResult<DataFrame> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|(name, data_type)| {
            if frame.schema().field_with_unqualified_name(name).is_ok() {
                ident(name)
            } else {
                cast(lit(ScalarValue::Null), data_type.clone()).alias(name)
            }
        })
        .collect();
    Ok(frame.select(exprs)?)
}

/// Unions `parts` after lining each one up on `columns` by name.
fn union_by_name(
    parts: &[DataFrame],
    columns: &[(String, DataType)],
) -> TripLoaderResult<DataFrame> {
    let mut aligned = parts.iter().map(|part| align(part.clone(), columns));
    let first = aligned.next().ok_or_else(|| {
        TripLoaderError::InvalidParameter("nothing to combine".to_string())
    })??;
    aligned.try_fold(first, |combined, next| -> TripLoaderResult<DataFrame> {
        Ok(combined.union(next?)?)
    })
}

/// Reads `uploads` in order and stacks the readable ones, matching columns by name.
///
/// The combined table has every column seen in any accepted file, in order of first
/// appearance; rows from files without a column hold null there. A file that shares no column
/// with the files before it is skipped. Fails with a `ParseError` only when no upload could be
/// read.
pub async fn combine_uploads(
    ctx: &SessionContext,
    uploads: &[Upload],
) -> TripLoaderResult<CombinedUpload> {
    let mut parts: Vec<DataFrame> = Vec::new();
    let mut columns: Vec<(String, DataType)> = Vec::new();
    let mut combined: Option<DataFrame> = None;
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for (i, upload) in uploads.iter().enumerate() {
        info!("Reading {} ({}/{})", upload.name, i + 1, uploads.len());

        if upload_format(&upload.name).is_none() {
            warn!("Skipping {}: only CSV and Parquet uploads are supported", upload.name);
            skipped.push(SkippedUpload {
                name: upload.name.clone(),
                reason: "unsupported format".to_string(),
            });
            continue;
        }

        let (frame, rows) = match read_upload(ctx, upload).await {
            Ok(read) => read,
            Err(e) => {
                warn!("Skipping {}: {}", upload.name, e);
                skipped.push(SkippedUpload {
                    name: upload.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let fields: Vec<(String, DataType)> = frame
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect();
        let shared = fields
            .iter()
            .any(|(name, _)| columns.iter().any(|(known, _)| known == name));
        if !columns.is_empty() && !shared {
            warn!("Skipping {}: no columns in common with earlier files", upload.name);
            skipped.push(SkippedUpload {
                name: upload.name.clone(),
                reason: "no columns in common with earlier files".to_string(),
            });
            continue;
        }

        let mut candidate_columns = columns.clone();
        for (name, data_type) in fields {
            if !candidate_columns.iter().any(|(known, _)| *known == name) {
                debug!("{} adds column '{}'", upload.name, name);
                candidate_columns.push((name, data_type));
            }
        }
        parts.push(frame);

        match union_by_name(&parts, &candidate_columns) {
            Ok(frame) => {
                info!("{}: {} rows", upload.name, rows);
                combined = Some(frame);
                columns = candidate_columns;
                accepted.push(AcceptedUpload {
                    name: upload.name.clone(),
                    rows,
                });
            }
            Err(e) => {
                parts.pop();
                warn!("Skipping {}: columns do not match earlier files: {}", upload.name, e);
                skipped.push(SkippedUpload {
                    name: upload.name.clone(),
                    reason: format!("columns do not match earlier files: {}", e),
                });
            }
        }
    }

    let frame = combined.ok_or_else(|| {
        TripLoaderError::ParseError("none of the uploaded files could be read".to_string())
    })?;
    info!(
        "Combined {} rows from {} of {} files",
        accepted.iter().map(|a| a.rows).sum::<usize>(),
        accepted.len(),
        uploads.len()
    );
    Ok(CombinedUpload {
        frame,
        accepted,
        skipped,
    })
}
