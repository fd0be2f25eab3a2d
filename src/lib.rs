//! # Trip Loader
//!
//! Loads NYC taxi trip data from a file-sharing link or from uploaded files, cleans it, and derives
//! the figures an exploration dashboard shows. Tables are Apache DataFusion `DataFrame`s.
//!
//! - [`fetcher`]: resolves a sharing link, downloads the file, and parses it by extension.
//! - [`normalizer`]: column type coercion and exact-duplicate removal.
//! - [`transformers`]: the individual cleaning, labelling, and filtering steps.
//! - [`summary`]: headline metrics and the data period.
//! - [`statistics`]: trips per day and hour, numeric profiles, and value counts.
//! - [`period`]: the period a user declares their uploads to cover.
//! - [`sample`]: a seeded synthetic trip table.
//! - [`session`]: per-user state tying the pieces together.
//! - [`export`]: writes a cleaned table to Parquet.
//!
//! Set `DEBUG_TRIP_LOADER=true` to see what the library is doing.

pub mod exceptions;
pub mod export;
pub mod fetcher;
mod logging;
pub mod normalizer;
pub mod period;
pub mod pipeline;
pub mod sample;
pub mod session;
pub mod settings;
pub mod statistics;
pub mod summary;
pub mod transformers;

pub use exceptions::{FailureKind, TripLoaderError, TripLoaderResult};
pub use fetcher::{Fetcher, LoadFailure, LoadResult, LoadedDataset};
pub use normalizer::{NormalizationReport, NormalizedDataset, Normalizer};
pub use period::PeriodMetadata;
pub use session::Session;
pub use settings::LoaderSettings;
pub use summary::{DataPeriod, TripSummary};
