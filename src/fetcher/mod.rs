//! ## Remote Fetcher
//!
//! Turns a sharing link into a loaded DataFrame:
//!
//! 1. extract the resource id from the link ([`reference`]);
//! 2. download the file behind the canonical URL with the primary transport, retrying once with the
//!    fallback transport when the primary does not understand the response ([`transport`]);
//! 3. check that the file landed on disk and parse it by extension ([`formats`]).
//!
//! Every failure is recovered at this boundary: [`Fetcher::load`] never returns an error, it returns
//! [`LoadResult::Failed`] with a [`FailureKind`] and a readable reason. The downloaded file is left
//! on disk.
//!
//! ### Example
//!
//! ```rust,no_run
//! use trip_loader::fetcher::{Fetcher, LoadResult};
//! use trip_loader::settings::LoaderSettings;
//!
//! # async fn run() {
//! let fetcher = Fetcher::new(LoaderSettings::default());
//! match fetcher.load("https://drive.google.com/file/d/FILE_ID/view?usp=sharing").await {
//!     LoadResult::Loaded(data) => println!("{} rows, {} columns", data.rows, data.columns),
//!     LoadResult::Failed(failure) => eprintln!("{}", failure),
//! }
//! # }
//! ```

pub mod formats;
pub mod reference;
pub mod transport;
pub mod uploads;

use crate::exceptions::{FailureKind, TripLoaderError, TripLoaderResult};
use crate::settings::LoaderSettings;
use datafusion::prelude::{DataFrame, SessionContext};
use formats::read_table;
use reference::{resolve_reference, ResourceId};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use transport::{DriveTransport, HttpTransport, Transport};

/// A successfully loaded table.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// The parsed table, materialized in memory.
    pub frame: DataFrame,
    /// Where the table was read from.
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Why a load failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl From<TripLoaderError> for LoadFailure {
    fn from(err: TripLoaderError) -> Self {
        Self {
            kind: err.failure_kind(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of a load: all or nothing.
#[derive(Debug, Clone)]
pub enum LoadResult {
    Loaded(LoadedDataset),
    Failed(LoadFailure),
}

impl LoadResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadResult::Loaded(_))
    }

    /// The failure kind, if the load failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            LoadResult::Loaded(_) => None,
            LoadResult::Failed(failure) => Some(failure.kind),
        }
    }

    pub fn into_result(self) -> Result<LoadedDataset, LoadFailure> {
        match self {
            LoadResult::Loaded(data) => Ok(data),
            LoadResult::Failed(failure) => Err(failure),
        }
    }
}

impl From<TripLoaderResult<LoadedDataset>> for LoadResult {
    fn from(result: TripLoaderResult<LoadedDataset>) -> Self {
        match result {
            Ok(data) => LoadResult::Loaded(data),
            Err(err) => LoadResult::Failed(err.into()),
        }
    }
}

/// Reads a local file by extension and materializes it, reporting its shape.
pub async fn load_file(ctx: &SessionContext, path: &Path) -> TripLoaderResult<LoadedDataset> {
    let frame = read_table(ctx, path).await?;
    let frame = frame
        .cache()
        .await
        .map_err(|e| TripLoaderError::ParseError(format!("{}: {}", path.display(), e)))?;
    let rows = frame.clone().count().await?;
    let columns = frame.schema().fields().len();
    Ok(LoadedDataset {
        frame,
        path: path.to_path_buf(),
        rows,
        columns,
    })
}

/// Resolves sharing links to downloaded, parsed tables.
pub struct Fetcher {
    settings: LoaderSettings,
    primary: Box<dyn Transport>,
    fallback: Box<dyn Transport>,
    ctx: SessionContext,
}

impl Fetcher {
    /// Creates a fetcher with the HTTP transports.
    pub fn new(settings: LoaderSettings) -> Self {
        let client = reqwest::Client::new();
        Self::with_transports(
            settings,
            Box::new(DriveTransport::new(client.clone())),
            Box::new(HttpTransport::new(client)),
        )
    }

    /// Creates a fetcher with custom transports.
    pub fn with_transports(
        settings: LoaderSettings,
        primary: Box<dyn Transport>,
        fallback: Box<dyn Transport>,
    ) -> Self {
        Self {
            settings,
            primary,
            fallback,
            ctx: SessionContext::new(),
        }
    }

    /// Loads the table behind `reference`. Never fails: errors come back as [`LoadResult::Failed`].
    pub async fn load(&self, reference: &str) -> LoadResult {
        let result: LoadResult = self.try_load(reference).await.into();
        match &result {
            LoadResult::Loaded(data) => info!(
                "Loaded {} rows and {} columns from {}",
                data.rows,
                data.columns,
                data.path.display()
            ),
            LoadResult::Failed(failure) => error!("Load failed: {}", failure),
        }
        result
    }

    /// Like [`Fetcher::load`], but returns the error instead of folding it into a result value.
    pub async fn try_load(&self, reference: &str) -> TripLoaderResult<LoadedDataset> {
        let id = resolve_reference(reference)?;
        info!("Resolved file id {}", id);
        let destination = self.settings.output_path();
        // Reject an unparseable target before spending a download on it.
        formats::FileFormat::from_path(&destination)?;
        self.download(&id, &destination).await?;
        load_file(&self.ctx, &destination).await
    }

    /// Downloads the resource into `destination`, using the fallback transport at most once.
    pub async fn download(&self, id: &ResourceId, destination: &Path) -> TripLoaderResult<()> {
        let url = id.download_url(&self.settings.download_base_url);
        info!("Downloading {} with the {} transport", url, self.primary.name());

        match self.primary.fetch(&url, destination).await {
            Ok(()) => {}
            Err(err) if err.triggers_fallback() => {
                warn!(
                    "The {} transport failed ({}); retrying with the {} transport",
                    self.primary.name(),
                    err,
                    self.fallback.name()
                );
                self.fallback.fetch(&url, destination).await.map_err(|e| {
                    TripLoaderError::DownloadError(format!(
                        "fallback download of {} failed: {}",
                        url, e
                    ))
                })?;
            }
            Err(err) => {
                return Err(TripLoaderError::DownloadError(format!(
                    "download of {} failed: {}",
                    url, err
                )));
            }
        }

        if !destination.exists() {
            return Err(TripLoaderError::DownloadError(format!(
                "{} was not written; make sure the file is shared with anyone who has the link",
                destination.display()
            )));
        }
        Ok(())
    }
}
