//! ## Loader Settings
//!
//! Configuration shared by the fetcher, the normalizer, and the session.
//! [`LoaderSettings::default`] gives the stock values; [`LoaderSettings::from_env`] lets
//! a deployment override them with `TRIP_LOADER_*` environment variables.

use crate::fetcher::formats::FileFormat;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Base of the canonical download URL; the resource id is appended as `?id=<ID>`.
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://drive.google.com/uc";

/// Stem of the file the download is written to.
pub const DEFAULT_OUTPUT_STEM: &str = "nyc_taxi_data";

/// Column-name fragments that suggest a datetime column.
pub const DEFAULT_DATETIME_KEYWORDS: [&str; 4] = ["pickup", "dropoff", "date", "time"];

/// How long a loaded link stays memoized in a session.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

pub const ENV_DOWNLOAD_URL: &str = "TRIP_LOADER_DOWNLOAD_URL";
pub const ENV_OUTPUT_DIR: &str = "TRIP_LOADER_OUTPUT_DIR";
pub const ENV_OUTPUT_FILE: &str = "TRIP_LOADER_OUTPUT_FILE";
pub const ENV_CACHE_TTL_SECS: &str = "TRIP_LOADER_CACHE_TTL_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    /// Base URL the resource id is appended to.
    pub download_base_url: String,
    /// Directory the downloaded file is written to.
    pub output_dir: PathBuf,
    /// Name of the downloaded file. Its extension selects the parser.
    pub output_filename: String,
    /// Lower-case fragments that mark a column as a datetime candidate.
    pub datetime_keywords: Vec<String>,
    /// Lifetime of memoized link loads.
    pub cache_ttl: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            output_filename: format!("{}.{}", DEFAULT_OUTPUT_STEM, FileFormat::Csv.extension()),
            datetime_keywords: DEFAULT_DATETIME_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl LoaderSettings {
    /// Default settings overridden by whichever `TRIP_LOADER_*` variables are set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a key lookup. Invalid values are skipped with a warning.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DOWNLOAD_URL).filter(|v| !v.is_empty()) {
            self.download_base_url = url;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_OUTPUT_FILE).filter(|v| !v.is_empty()) {
            self.output_filename = file;
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.cache_ttl = Duration::from_secs(secs),
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_CACHE_TTL_SECS, raw, e),
            }
        }
        self
    }

    /// Names the download `nyc_taxi_data.<ext>` for the given format.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.output_filename = format!("{}.{}", DEFAULT_OUTPUT_STEM, format.extension());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_output_filename(mut self, name: impl Into<String>) -> Self {
        self.output_filename = name.into();
        self
    }

    pub fn with_download_base_url(mut self, url: impl Into<String>) -> Self {
        self.download_base_url = url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Full path of the download destination.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}
