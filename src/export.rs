//! ## Parquet Export
//!
//! Writes a cleaned table to a single Snappy-compressed Parquet file so it can be reloaded later
//! without going through the download again.

use crate::exceptions::TripLoaderResult;
use datafusion::dataframe::DataFrame;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Writes every row of `df` to `path`, replacing the file if it exists. Returns the rows written.
pub async fn export_parquet(df: DataFrame, path: &Path) -> TripLoaderResult<usize> {
    let plan_schema = Arc::new(df.schema().as_arrow().clone());
    let batches = df.collect().await?;
    let schema = batches
        .first()
        .map(|batch| batch.schema())
        .unwrap_or(plan_schema);

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    let mut rows = 0;
    for batch in &batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;

    info!("Wrote {} rows to {}", rows, path.display());
    Ok(rows)
}
