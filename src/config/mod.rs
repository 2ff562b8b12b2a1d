//! Configuration module for the catalog scraper.
//!
//! Values come from a TOML file (default `acalog.toml`) overlaid with
//! `ACALOG_`-prefixed environment variables; nested keys use `__`, e.g.
//! `ACALOG_BROWSER__HEADLESS=false`.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::{DurationParser, TimeUnit};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the application's own targets.
    ///
    /// Defaults to "info" if not specified.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Number of catalog years scraped concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Directory receiving one spreadsheet per catalog year.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Spreadsheet format written for each year.
    #[serde(default)]
    pub export_format: ExportFormat,
    /// Directory receiving one diagnostic log per catalog year.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// File that receives the run's elapsed wall time in seconds.
    #[serde(default = "default_timing_file")]
    pub timing_file: Option<PathBuf>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: Timing,
    /// Catalog year (e.g. `2025_2026`) to the first listing page of that year's catalog.
    #[serde(default)]
    pub catalogs: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

/// WebDriver session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Address of a running chromedriver.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Extra Chrome command line arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            args: Vec::new(),
        }
    }
}

/// Pauses and bounded waits used while driving the catalog.
///
/// Each accepts `"10s"`, `"500ms"`, `"1m"` or a bare number of seconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause after loading a catalog's first page, before reading pagination.
    #[serde(deserialize_with = "deserialize_duration")]
    pub initial_settle: Duration,
    /// Pause after loading each listing page.
    #[serde(deserialize_with = "deserialize_duration")]
    pub page_settle: Duration,
    /// Bound on waiting for the listing table to render.
    #[serde(deserialize_with = "deserialize_duration")]
    pub listing_wait: Duration,
    /// Bound on waiting for a detail panel or a new window after a click.
    #[serde(deserialize_with = "deserialize_duration")]
    pub expand_wait: Duration,
    /// Bound on waiting for the detail panel markup to be readable.
    #[serde(deserialize_with = "deserialize_duration")]
    pub detail_wait: Duration,
    /// Bound on waiting for the detail panel to disappear after collapsing.
    #[serde(deserialize_with = "deserialize_duration")]
    pub collapse_wait: Duration,
    /// Pause between reading a detail panel and collapsing it.
    #[serde(deserialize_with = "deserialize_duration")]
    pub row_pause: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            initial_settle: Duration::from_secs(5),
            page_settle: Duration::from_secs(2),
            listing_wait: Duration::from_secs(10),
            expand_wait: Duration::from_secs(10),
            detail_wait: Duration::from_secs(5),
            collapse_wait: Duration::from_secs(10),
            row_pause: Duration::from_millis(500),
        }
    }
}

impl Timing {
    /// No pauses and single-check waits, for scripted browsers.
    pub fn immediate() -> Self {
        Self {
            initial_settle: Duration::ZERO,
            page_settle: Duration::ZERO,
            listing_wait: Duration::ZERO,
            expand_wait: Duration::ZERO,
            detail_wait: Duration::ZERO,
            collapse_wait: Duration::ZERO,
            row_pause: Duration::ZERO,
        }
    }
}

/// One catalog year to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub year: String,
    pub url: Url,
}

/// Configuration that can't produce a runnable set of jobs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no catalogs configured")]
    NoCatalogs,
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("catalog {year}: invalid source URL {url:?}")]
    InvalidUrl {
        year: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("catalog year {0:?} is not configured")]
    UnknownYear(String),
}

impl Config {
    /// Loads the TOML file at `path` (missing files are skipped) and overlays the environment.
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACALOG_").split("__"))
            .extract()
    }

    /// Validated catalogs in configuration order, optionally restricted to `only`.
    pub fn catalogs(&self, only: &[String]) -> Result<Vec<Catalog>, ConfigError> {
        if let Some(unknown) = only.iter().find(|year| !self.catalogs.contains_key(*year)) {
            return Err(ConfigError::UnknownYear(unknown.clone()));
        }

        let catalogs = self
            .catalogs
            .iter()
            .filter(|(year, _)| only.is_empty() || only.contains(year))
            .map(|(year, url)| {
                Url::parse(url)
                    .map(|url| Catalog {
                        year: year.clone(),
                        url,
                    })
                    .map_err(|source| ConfigError::InvalidUrl {
                        year: year.clone(),
                        url: url.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if catalogs.is_empty() {
            return Err(ConfigError::NoCatalogs);
        }
        Ok(catalogs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("spreadsheets")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_timing_file() -> Option<PathBuf> {
    Some(PathBuf::from("time_elapsed.txt"))
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

/// Accepts either a bare number of seconds or a unit-suffixed string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => {
            let parsed = DurationParser::with_time_units(&[
                TimeUnit::MilliSecond,
                TimeUnit::Second,
                TimeUnit::Minute,
            ])
            .parse(text.trim())
            .map_err(|e| D::Error::custom(format!("invalid duration {text:?}: {e}")))?;
            Duration::try_from(parsed)
                .map_err(|e| D::Error::custom(format!("invalid duration {text:?}: {e}")))
        }
    }
}
