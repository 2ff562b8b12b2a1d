//! Runs catalog-year jobs on a fixed pool of workers and exports the results.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};

use crate::browser::BrowserLauncher;
use crate::config::{Catalog, ConfigError, Timing};
use crate::export::{ExportError, ExportSink};
use crate::scraper::errors::ScrapeError;
use crate::scraper::job::{CompletedJob, ScrapeJob};
use crate::scraper::worker::{JobOutcome, Worker};

/// A job that did not complete.
#[derive(Debug)]
pub struct JobFailure {
    pub catalog_year: String,
    pub error: ScrapeError,
}

/// The export result for one completed year.
#[derive(Debug)]
pub struct ExportOutcome {
    pub catalog_year: String,
    pub result: Result<PathBuf, ExportError>,
}

/// Everything one orchestrated run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Completed jobs in the order they finished.
    pub completed: Vec<CompletedJob>,
    pub failures: Vec<JobFailure>,
    pub exports: Vec<ExportOutcome>,
}

impl RunReport {
    /// True when every job completed and every export was written.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.exports.iter().all(|e| e.result.is_ok())
    }
}

pub struct Orchestrator {
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<dyn ExportSink>,
    workers: usize,
    timing: Timing,
    log_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn ExportSink>,
        workers: usize,
        timing: Timing,
    ) -> Self {
        Self {
            launcher,
            sink,
            workers,
            timing,
            log_dir: None,
        }
    }

    /// Sends each job's events to `<dir>/<catalog_year>.log` instead of the global subscriber.
    pub fn with_job_logs(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    /// Scrapes every catalog, then exports each successful year.
    ///
    /// Only misconfiguration is an error here; job and export failures are
    /// reported per year in the returned [`RunReport`].
    pub async fn run(&self, catalogs: Vec<Catalog>) -> Result<RunReport, ConfigError> {
        if catalogs.is_empty() {
            return Err(ConfigError::NoCatalogs);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let pool_size = self.workers.min(catalogs.len());
        info!(
            catalogs = catalogs.len(),
            workers = pool_size,
            "Scraping course catalogs"
        );

        let submitted: Vec<String> = catalogs.iter().map(|c| c.year.clone()).collect();
        let queue: VecDeque<ScrapeJob> = catalogs
            .into_iter()
            .map(|catalog| ScrapeJob::new(catalog, self.timing))
            .collect();
        let queue = Arc::new(Mutex::new(queue));
        let (tx, mut rx) = mpsc::unbounded_channel::<JobOutcome>();

        let handles: Vec<_> = (0..pool_size)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    queue.clone(),
                    self.launcher.clone(),
                    self.log_dir.clone(),
                    tx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        drop(tx);

        let mut report = RunReport::default();
        while let Some(JobOutcome {
            catalog_year,
            result,
        }) = rx.recv().await
        {
            match result {
                Ok(job) => {
                    info!(catalog_year = catalog_year.as_str(), "Successfully completed");
                    report.completed.push(job);
                }
                Err(error) => {
                    error!(catalog_year = catalog_year.as_str(), error = %error, "Job failed");
                    report.failures.push(JobFailure {
                        catalog_year,
                        error,
                    });
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "Worker task aborted");
            }
        }

        // A year with no outcome was lost to a worker that died mid-job or never started it.
        for year in submitted {
            let reported = report.completed.iter().any(|j| j.catalog_year() == year)
                || report.failures.iter().any(|f| f.catalog_year == year);
            if !reported {
                error!(catalog_year = year.as_str(), "Job produced no outcome");
                report.failures.push(JobFailure {
                    catalog_year: year,
                    error: ScrapeError::Panicked("worker stopped before reporting the job".into()),
                });
            }
        }

        info!("Saving results");
        for job in &report.completed {
            let result = self.sink.export(job);
            match &result {
                Ok(path) => info!(
                    catalog_year = job.catalog_year(),
                    courses = job.records().len(),
                    path = %path.display(),
                    "Export saved"
                ),
                Err(e) => error!(
                    catalog_year = job.catalog_year(),
                    error = %e,
                    "Export failed"
                ),
            }
            report.exports.push(ExportOutcome {
                catalog_year: job.catalog_year().to_owned(),
                result,
            });
        }

        Ok(report)
    }
}
