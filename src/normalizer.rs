//! ## Normalizer
//!
//! Cleans a raw trip table in two passes:
//!
//! 1. **Type coercion.** Every column is resolved to an optional [`ColumnKind`]. An explicit schema
//!    mapping wins; otherwise float and integer columns keep their numeric family, and columns whose
//!    name contains a datetime keyword (`pickup`, `dropoff`, `date`, `time` by default) are parsed as
//!    timestamps when they hold text. Values that do not parse become null; the number of nulls each
//!    coercion introduced is reported.
//! 2. **Duplicate removal.** Rows that are identical across every column are dropped and the removal
//!    count is reported.
//!
//! The output has the same columns in the same order, never more rows than the input, and
//! normalizing it again yields the same rows and schema.
//!
//! ### Example
//!
//! ```rust,no_run
//! use trip_loader::normalizer::Normalizer;
//! use trip_loader::transformers::coercion::ColumnKind;
//! # use datafusion::prelude::DataFrame;
//!
//! # async fn run(raw: DataFrame) -> trip_loader::exceptions::TripLoaderResult<()> {
//! let normalizer = Normalizer::default().with_column("passenger_count", ColumnKind::Integer);
//! let cleaned = normalizer.normalize(raw).await?;
//! println!("removed {} duplicates", cleaned.report.duplicates_removed());
//! # Ok(())
//! # }
//! ```

use crate::exceptions::TripLoaderResult;
use crate::make_pipeline;
use crate::settings::{LoaderSettings, DEFAULT_DATETIME_KEYWORDS};
use crate::transformers::coercion::{ColumnKind, IntegerDowncast, TypeCoercion};
use crate::transformers::deduplication::drop_duplicates_counted;
use crate::transformers::{is_float_type, is_integer_type, is_temporal_type, is_text_type};
use datafusion::arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{ident, lit};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A datetime classification that was not applied because the column's type cannot hold one.
#[derive(Debug, Clone, PartialEq)]
pub struct UnappliedSuggestion {
    pub column: String,
    /// Type the column had when the suggestion was rejected.
    pub found: DataType,
}

/// An explicit schema mapping that the column's type cannot take.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMapping {
    pub column: String,
    /// Kind the schema asked for.
    pub requested: ColumnKind,
    pub found: DataType,
}

/// How the columns of one table will be coerced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationPlan {
    /// Target kind per column, in table order. Columns without a kind are left alone.
    pub columns: Vec<(String, ColumnKind)>,
    /// Name-based datetime guesses that did not fit the column's type.
    pub unapplied_suggestions: Vec<UnappliedSuggestion>,
    pub rejected_mappings: Vec<RejectedMapping>,
}

impl NormalizationPlan {
    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, kind)| *kind)
    }
}

/// Null diagnostics for one coerced column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCoercion {
    pub column: String,
    pub kind: ColumnKind,
    pub nulls_before: usize,
    pub nulls_after: usize,
}

impl ColumnCoercion {
    /// Values that failed to parse and were replaced with null.
    pub fn nulls_introduced(&self) -> usize {
        self.nulls_after.saturating_sub(self.nulls_before)
    }
}

/// What a normalization run changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub coercions: Vec<ColumnCoercion>,
    pub unapplied_suggestions: Vec<UnappliedSuggestion>,
    pub rejected_mappings: Vec<RejectedMapping>,
}

impl NormalizationReport {
    pub fn duplicates_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    /// Columns that ended up datetime-typed, in table order.
    pub fn datetime_columns(&self) -> Vec<&str> {
        self.coercions
            .iter()
            .filter(|c| c.kind == ColumnKind::Datetime)
            .map(|c| c.column.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnCoercion> {
        self.coercions.iter().find(|c| c.column == name)
    }
}

/// A cleaned table, materialized in memory, and its report.
#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    pub frame: DataFrame,
    pub report: NormalizationReport,
}

/// Column-wise type coercion followed by exact-duplicate removal.
#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: HashMap<String, ColumnKind>,
    datetime_keywords: Vec<String>,
    verbose: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_DATETIME_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        )
    }
}

impl Normalizer {
    /// Creates a normalizer that suggests datetime columns by the given name fragments.
    pub fn new(datetime_keywords: Vec<String>) -> Self {
        Self {
            schema: HashMap::new(),
            datetime_keywords: datetime_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            verbose: false,
        }
    }

    pub fn from_settings(settings: &LoaderSettings) -> Self {
        Self::new(settings.datetime_keywords.clone())
    }

    /// Replaces the explicit schema mapping. Mapped columns bypass the name heuristic.
    pub fn with_schema(mut self, schema: HashMap<String, ColumnKind>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_column(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
        self.schema.insert(column.into(), kind);
        self
    }

    /// Logs pipeline steps at info level instead of debug.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn schema(&self) -> &HashMap<String, ColumnKind> {
        &self.schema
    }

    fn matches_keyword(&self, column: &str) -> bool {
        let lowered = column.to_lowercase();
        self.datetime_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }

    /// Heuristic classification of every column, ignoring the explicit mapping.
    ///
    /// The result can be edited and handed back through [`Normalizer::with_schema`].
    pub fn suggest_schema(&self, df: &DataFrame) -> HashMap<String, ColumnKind> {
        self.plan_columns(df, &HashMap::new())
            .columns
            .into_iter()
            .collect()
    }

    /// Resolves the coercion target of each column of `df`.
    pub fn plan(&self, df: &DataFrame) -> NormalizationPlan {
        for name in self.schema.keys() {
            if df.schema().field_with_name(None, name).is_err() {
                warn!("Schema maps column '{}', which the table does not have", name);
            }
        }
        self.plan_columns(df, &self.schema)
    }

    fn plan_columns(
        &self,
        df: &DataFrame,
        schema: &HashMap<String, ColumnKind>,
    ) -> NormalizationPlan {
        let mut plan = NormalizationPlan::default();
        for field in df.schema().fields() {
            let name = field.name();
            let data_type = field.data_type();

            if let Some(kind) = schema.get(name) {
                if kind.applies_to(data_type) {
                    plan.columns.push((name.clone(), *kind));
                } else {
                    warn!(
                        "Column '{}' is mapped to {} but has type {:?}; leaving it unchanged",
                        name, kind, data_type
                    );
                    plan.rejected_mappings.push(RejectedMapping {
                        column: name.clone(),
                        requested: *kind,
                        found: data_type.clone(),
                    });
                }
                continue;
            }

            let numeric = if is_float_type(data_type) {
                Some(ColumnKind::Float)
            } else if is_integer_type(data_type) {
                Some(ColumnKind::Integer)
            } else {
                None
            };

            if self.matches_keyword(name) {
                if is_text_type(data_type) || is_temporal_type(data_type) {
                    plan.columns.push((name.clone(), ColumnKind::Datetime));
                    continue;
                }
                debug!(
                    "Column '{}' looks like a datetime by name but has type {:?}",
                    name, data_type
                );
                plan.unapplied_suggestions.push(UnappliedSuggestion {
                    column: name.clone(),
                    found: data_type.clone(),
                });
            }

            if let Some(kind) = numeric {
                plan.columns.push((name.clone(), kind));
            }
        }
        plan
    }

    /// Coerces column types and drops exact duplicates.
    ///
    /// Coercion never fails on a value; an error here means the query itself could not run.
    pub async fn normalize(&self, df: DataFrame) -> TripLoaderResult<NormalizedDataset> {
        let plan = self.plan(&df);
        let integer_columns: Vec<String> = plan
            .columns
            .iter()
            .filter(|(_, kind)| *kind == ColumnKind::Integer)
            .map(|(name, _)| name.clone())
            .collect();
        let coerced_columns: Vec<(String, ColumnKind)> = plan
            .columns
            .iter()
            .filter(|(_, kind)| *kind != ColumnKind::Text)
            .cloned()
            .collect();

        let nulls_before = null_counts(&df, &coerced_columns).await?;

        let mut pipeline = make_pipeline!(
            self.verbose,
            ("coerce_types", TypeCoercion::new(plan.columns.clone())),
            ("downcast_integers", IntegerDowncast::new(integer_columns)),
        );
        let coerced = pipeline.fit_transform(&df).await?.cache().await?;
        let nulls_after = null_counts(&coerced, &coerced_columns).await?;

        let coercions: Vec<ColumnCoercion> = coerced_columns
            .iter()
            .zip(nulls_before.iter().zip(nulls_after.iter()))
            .map(|((column, kind), (before, after))| ColumnCoercion {
                column: column.clone(),
                kind: *kind,
                nulls_before: *before,
                nulls_after: *after,
            })
            .collect();
        for coercion in coercions.iter().filter(|c| c.nulls_introduced() > 0) {
            warn!(
                "Column '{}': {} values could not be parsed as {} and were set to null",
                coercion.column,
                coercion.nulls_introduced(),
                coercion.kind
            );
        }

        let rows_before = coerced.clone().count().await?;
        let (frame, removed) = drop_duplicates_counted(coerced).await?;
        if removed > 0 {
            info!("Removed {} duplicate rows", removed);
        }

        Ok(NormalizedDataset {
            frame,
            report: NormalizationReport {
                rows_before,
                rows_after: rows_before.saturating_sub(removed),
                coercions,
                unapplied_suggestions: plan.unapplied_suggestions,
                rejected_mappings: plan.rejected_mappings,
            },
        })
    }
}

/// Null count of each column, in the order given. One aggregate query for all of them.
async fn null_counts(df: &DataFrame, columns: &[(String, ColumnKind)]) -> TripLoaderResult<Vec<usize>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let mut aggregates = vec![count(lit(1)).alias("rows")];
    aggregates.extend(
        columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| count(ident(name)).alias(format!("non_null_{}", i))),
    );
    let batches = df.clone().aggregate(vec![], aggregates)?.collect().await?;
    let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
        return Ok(vec![0; columns.len()]);
    };

    let as_count = |i: usize| -> TripLoaderResult<usize> {
        match ScalarValue::try_from_array(batch.column(i), 0)? {
            ScalarValue::Int64(Some(n)) => Ok(n.max(0) as usize),
            _ => Ok(0),
        }
    };
    let rows = as_count(0)?;
    (1..=columns.len())
        .map(|i| as_count(i).map(|non_null| rows.saturating_sub(non_null)))
        .collect()
}
