//! ## Duplicate Removal
//!
//! [`DropDuplicates`] removes rows that are exact duplicates across every column. Values are
//! compared by equality, and two nulls in the same column count as equal. One copy of each row
//! survives; the order of the surviving rows is not guaranteed.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use crate::impl_transformer;
use datafusion::dataframe::DataFrame;

/// Removes exact-duplicate rows. Stateless, and a no-op on an already deduplicated frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropDuplicates;

impl DropDuplicates {
    pub fn new() -> Self {
        Self
    }

    /// Stateless transformer: fit does nothing.
    pub async fn fit(&mut self, _df: &DataFrame) -> TripLoaderResult<()> {
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        df.distinct().map_err(TripLoaderError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(DropDuplicates);

/// Deduplicates `df` and reports how many rows were removed.
///
/// Both counts run queries, so the result is materialized in memory before it is returned.
pub async fn drop_duplicates_counted(df: DataFrame) -> TripLoaderResult<(DataFrame, usize)> {
    let before = df.clone().count().await?;
    let deduped = DropDuplicates::new().transform(df)?.cache().await?;
    let after = deduped.clone().count().await?;
    Ok((deduped, before.saturating_sub(after)))
}
