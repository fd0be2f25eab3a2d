//! ## Session
//!
//! A [`Session`] holds everything one user's exploration needs between actions: the settings, the
//! fetcher and normalizer, the dataset currently on display, and a cache of recent link loads.
//! It is created when the user starts and cleared with [`Session::reset`].
//!
//! Loading a link or a set of uploads runs the whole chain: fetch or combine, normalize, map the
//! data dictionary codes to labels, and detect the data period. The result replaces the current
//! dataset only when every step succeeded. Uploads may come with a declared [`PeriodMetadata`],
//! which labels the dataset in place of the detected period.
//!
//! ### Example
//!
//! ```rust,no_run
//! use trip_loader::session::Session;
//! use trip_loader::settings::LoaderSettings;
//!
//! # async fn run() {
//! let mut session = Session::new(LoaderSettings::from_env());
//! match session.load_link("https://drive.google.com/file/d/FILE_ID/view").await {
//!     Ok(data) => println!("{} rows", data.dataset.report.rows_after),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # }
//! ```

use crate::exceptions::TripLoaderResult;
use crate::fetcher::uploads::{combine_uploads, AcceptedUpload, SkippedUpload, Upload};
use crate::fetcher::{Fetcher, LoadFailure};
use crate::normalizer::{NormalizedDataset, Normalizer};
use crate::period::PeriodMetadata;
use crate::pipeline::{Pipeline, Transformer};
use crate::sample::sample_trips;
use crate::settings::LoaderSettings;
use crate::summary::{DataPeriod, TripSummary};
use crate::transformers::dictionary::CodeLabelMapper;
use datafusion::prelude::{DataFrame, SessionContext};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Where the current dataset came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Link(String),
    Uploads {
        accepted: Vec<AcceptedUpload>,
        skipped: Vec<SkippedUpload>,
    },
    /// The synthetic trip table, with the seed it was drawn from.
    Sample { rows: usize, seed: u64 },
}

/// A cleaned, labelled dataset ready for display.
#[derive(Debug, Clone)]
pub struct SessionDataset {
    pub source: DataSource,
    pub dataset: NormalizedDataset,
    /// Span of the first datetime column, whatever was declared.
    pub period: Option<DataPeriod>,
    pub declared_period: PeriodMetadata,
}

impl SessionDataset {
    pub fn frame(&self) -> &DataFrame {
        &self.dataset.frame
    }

    /// The period to show: the declared one, or the detected one when none was declared.
    pub fn period_label(&self) -> Option<String> {
        if self.declared_period.is_auto_detect() {
            self.period.as_ref().map(|p| p.to_string())
        } else {
            Some(self.declared_period.to_string())
        }
    }
}

pub struct Session {
    settings: LoaderSettings,
    fetcher: Fetcher,
    normalizer: Normalizer,
    labels: CodeLabelMapper,
    ctx: SessionContext,
    current: Option<SessionDataset>,
    cache: HashMap<String, (Instant, SessionDataset)>,
}

impl Session {
    pub fn new(settings: LoaderSettings) -> Self {
        Self {
            fetcher: Fetcher::new(settings.clone()),
            normalizer: Normalizer::from_settings(&settings),
            labels: CodeLabelMapper::nyc_taxi(),
            ctx: SessionContext::new(),
            current: None,
            cache: HashMap::new(),
            settings,
        }
    }

    /// Replaces the fetcher, for example one with custom transports.
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_labels(mut self, labels: CodeLabelMapper) -> Self {
        self.labels = labels;
        self
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Drops the current dataset and every cached load.
    pub fn reset(&mut self) {
        info!("Resetting session");
        self.current = None;
        self.cache.clear();
    }

    /// Loads, cleans, and stores the table behind `reference`.
    ///
    /// A reference loaded less than `cache_ttl` ago is served from the cache without another
    /// download. On failure the current dataset is kept.
    pub async fn load_link(&mut self, reference: &str) -> Result<&SessionDataset, LoadFailure> {
        let key = reference.trim().to_string();
        let ttl = self.settings.cache_ttl;
        match self.cache.get(&key) {
            Some((loaded_at, data)) if loaded_at.elapsed() < ttl => {
                debug!("Serving {} from the session cache", key);
                let data = data.clone();
                return Ok(self.current.insert(data));
            }
            Some(_) => {
                debug!("Cached load of {} expired", key);
                self.cache.remove(&key);
            }
            None => {}
        }

        let loaded = self.fetcher.load(&key).await.into_result()?;
        let (dataset, period) = self.prepare(loaded.frame).await?;
        let data = SessionDataset {
            source: DataSource::Link(key.clone()),
            dataset,
            period,
            declared_period: PeriodMetadata::AutoDetect,
        };
        self.cache.insert(key, (Instant::now(), data.clone()));
        Ok(self.current.insert(data))
    }

    /// Combines, cleans, and stores a set of uploaded files. Unreadable files are skipped.
    ///
    /// `period` is what the user says the files cover; pass [`PeriodMetadata::AutoDetect`] to
    /// go by the data alone.
    pub async fn load_uploads(
        &mut self,
        uploads: &[Upload],
        period: PeriodMetadata,
    ) -> Result<&SessionDataset, LoadFailure> {
        let combined = combine_uploads(&self.ctx, uploads).await?;
        let (dataset, detected) = self.prepare(combined.frame).await?;
        if !period.is_auto_detect() {
            info!("Uploads declared to cover {}", period);
        }
        Ok(self.current.insert(SessionDataset {
            source: DataSource::Uploads {
                accepted: combined.accepted,
                skipped: combined.skipped,
            },
            dataset,
            period: detected,
            declared_period: period,
        }))
    }

    /// Generates, cleans, and stores `rows` synthetic trips drawn from `seed`.
    pub async fn load_sample(
        &mut self,
        rows: usize,
        seed: u64,
    ) -> Result<&SessionDataset, LoadFailure> {
        info!("Generating {} sample trips (seed {})", rows, seed);
        let frame = sample_trips(&self.ctx, rows, seed)?;
        let (dataset, period) = self.prepare(frame).await?;
        Ok(self.current.insert(SessionDataset {
            source: DataSource::Sample { rows, seed },
            dataset,
            period,
            declared_period: PeriodMetadata::AutoDetect,
        }))
    }

    async fn prepare(
        &self,
        frame: DataFrame,
    ) -> TripLoaderResult<(NormalizedDataset, Option<DataPeriod>)> {
        let normalized = self.normalizer.normalize(frame).await?;
        let labelled = self.labels.transform(normalized.frame)?.cache().await?;
        let period = DataPeriod::detect(&labelled).await?;
        if let Some(period) = &period {
            info!("Data covers {}", period);
        }
        Ok((
            NormalizedDataset {
                frame: labelled,
                report: normalized.report,
            },
            period,
        ))
    }

    pub fn dataset(&self) -> Option<&SessionDataset> {
        self.current.as_ref()
    }

    pub fn period(&self) -> Option<&DataPeriod> {
        self.current.as_ref().and_then(|data| data.period.as_ref())
    }

    /// Summary of the current dataset, if one is loaded.
    pub async fn summary(&self) -> TripLoaderResult<Option<TripSummary>> {
        match &self.current {
            Some(data) => TripSummary::compute(data.frame()).await.map(Some),
            None => Ok(None),
        }
    }

    /// The current dataset with `filters` applied in order, if one is loaded.
    pub async fn filtered(
        &self,
        filters: Vec<Box<dyn Transformer + Send + Sync>>,
    ) -> TripLoaderResult<Option<DataFrame>> {
        let Some(data) = &self.current else {
            return Ok(None);
        };
        if filters.is_empty() {
            return Ok(Some(data.frame().clone()));
        }
        let steps = filters
            .into_iter()
            .enumerate()
            .map(|(i, filter)| (format!("filter_{}", i), filter))
            .collect();
        let mut pipeline = Pipeline::new(steps, false);
        pipeline.fit_transform(data.frame()).await.map(Some)
    }
}
