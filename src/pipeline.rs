//! ## Trip Loader Pipeline
//!
//! This module provides the abstractions used to clean and reshape trip data with composable
//! pipelines of transformers.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines a common interface for a data transformation step,
//!   supporting both stateful (requiring fitting) and stateless transformations.
//! - The [`Pipeline`] struct chains multiple transformers; each step's output plan is the next
//!   step's input.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify the implementation
//!   of transformers and the creation of pipelines.

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Trait for components used in a data transformation pipeline.
///
/// Every transformer must provide a `fit` method (which may collect data to compute parameters)
/// and a `transform` method (which updates the DataFrame's logical plan without triggering execution).
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<()>;

    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;
}

/// Macro to implement the [`Transformer`] trait for Trip Loader transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> TripLoaderResult<()>`
/// - `fn transform(&self, DataFrame) -> TripLoaderResult<DataFrame>`
/// - **`fn inherent_is_stateful(&self) -> bool`**
///
/// # Example
///
/// ```rust,no_run
/// use trip_loader::exceptions::TripLoaderResult;
/// use datafusion::prelude::DataFrame;
/// use trip_loader::impl_transformer;
///
/// pub struct KeepAll;
///
/// impl KeepAll {
///     pub async fn fit(&mut self, _df: &DataFrame) -> TripLoaderResult<()> {
///         Ok(())
///     }
///
///     pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
///         Ok(df)
///     }
///
///     fn inherent_is_stateful(&self) -> bool {
///         false
///     }
/// }
///
/// impl_transformer!(KeepAll);
/// ```
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::TripLoaderResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::TripLoaderResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
        }
    };
}

/// A pipeline that chains a sequence of transformers.
///
/// Each transformer's output (a new logical plan) is passed as input to the next transformer.
/// Nothing runs until a terminal action (like `collect`) is called, except for the aggregate
/// queries stateful transformers issue while fitting.
pub struct Pipeline {
    steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>,
    verbose: bool,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, transformer) pairs (each transformer is already boxed).
    /// * `verbose` - If true, logs each step and its timing at info level.
    pub fn new(steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>, verbose: bool) -> Self {
        Self { steps, verbose }
    }

    /// Names of the steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn log_step(verbose: bool, message: &str) {
        if verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    /// Fits each transformer (sequentially) and updates the logical plan.
    pub async fn fit(&mut self, df: &DataFrame) -> TripLoaderResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(TripLoaderError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        let verbose = self.verbose;
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            let start = Instant::now();
            step.fit(&current_df).await.map_err(|e| {
                TripLoaderError::InvalidParameter(format!(
                    "Error fitting transformer '{}': {}",
                    name, e
                ))
            })?;
            current_df = step.transform(current_df).map_err(|e| {
                TripLoaderError::InvalidParameter(format!(
                    "Error transforming in '{}': {}",
                    name, e
                ))
            })?;
            Self::log_step(
                verbose,
                &format!("Step '{}' completed in {:?}", name, start.elapsed()),
            );
        }
        Ok(current_df)
    }

    /// Applies the `transform` method of each transformer (without fitting).
    ///
    /// A stateful step that was never fitted fails with `FitNotCalled`.
    pub fn transform(&self, df: DataFrame) -> TripLoaderResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(TripLoaderError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            Self::log_step(self.verbose, &format!("Applying transformer: {}", name));
            current_df = step.transform(current_df).map_err(|e| match e {
                TripLoaderError::FitNotCalled => TripLoaderError::FitNotCalled,
                other => TripLoaderError::InvalidParameter(format!(
                    "Error in transformer '{}': {}",
                    name, other
                )),
            })?;
        }
        Ok(current_df)
    }

    /// Convenience method to call `fit` and then return the final transformed DataFrame.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> TripLoaderResult<DataFrame> {
        self.fit(df).await
    }
}

/// Macro to simplify pipeline creation by automatically boxing transformers.
///
/// # Example
///
/// ```rust,no_run
/// use trip_loader::make_pipeline;
/// use trip_loader::transformers::deduplication::DropDuplicates;
///
/// // Create a pipeline with a single step.
/// let pipeline = make_pipeline!(false,
///     ("dedupe", DropDuplicates::new()),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, Box<dyn $crate::pipeline::Transformer + Send + Sync>)> = vec![
                $(
                    ($name.to_string(), Box::new($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps, $verbose)
        }
    };
}
