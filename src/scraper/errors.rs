//! Error types for scrape jobs.

use crate::acalog::LayoutError;
use crate::browser::BrowserError;

/// Why a whole catalog-year job failed.
///
/// Row-level interaction problems never surface here; they are logged and
/// the row is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("catalog layout violated: {0}")]
    Layout(#[from] LayoutError),
    #[error("failed to launch browser session")]
    Launch(#[source] BrowserError),
    #[error("failed to load {url}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },
    #[error("scrape panicked: {0}")]
    Panicked(String),
}
