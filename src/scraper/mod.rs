//! Catalog scraping: per-row interaction, page navigation, per-year jobs and
//! the worker pool that runs them.

pub mod errors;
pub mod job;
pub mod navigator;
pub mod orchestrator;
pub mod row;
pub mod worker;

pub use errors::ScrapeError;
pub use job::{CompletedJob, JobStats, ScrapeJob};
pub use orchestrator::{ExportOutcome, JobFailure, Orchestrator, RunReport};
