//! Error types for browser sessions.

use std::time::Duration;

/// A failed browser interaction.
///
/// Everything except [`BrowserError::Driver`] is expected churn on a live
/// catalog page and is handled by skipping the row at hand.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },
    #[error("row {index} is gone (listing now has {available} rows)")]
    StaleRow { index: usize, available: usize },
    #[error("element went stale: {0}")]
    StaleElement(&'static str),
    #[error("element not found: {0}")]
    MissingElement(&'static str),
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl BrowserError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            BrowserError::Timeout { .. } => "timeout",
            BrowserError::StaleRow { .. } => "stale_row",
            BrowserError::StaleElement(_) => "stale_element",
            BrowserError::MissingElement(_) => "missing_element",
            BrowserError::Driver(_) => "driver",
        }
    }
}
