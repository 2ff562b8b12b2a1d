use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};

use crate::browser::BrowserLauncher;
use crate::logging::job_log;
use crate::scraper::errors::ScrapeError;
use crate::scraper::job::{CompletedJob, ScrapeJob};
use crate::utils::fmt_duration;

/// What a worker reports back for each job it ran.
#[derive(Debug)]
pub struct JobOutcome {
    pub catalog_year: String,
    pub result: Result<CompletedJob, ScrapeError>,
}

/// A single worker instance.
///
/// Each worker runs in its own task and keeps taking jobs off the shared queue
/// until it is empty. A job runs entirely on the worker that took it.
pub struct Worker {
    id: usize,
    queue: Arc<Mutex<VecDeque<ScrapeJob>>>,
    launcher: Arc<dyn BrowserLauncher>,
    log_dir: Option<PathBuf>,
    outcomes: mpsc::UnboundedSender<JobOutcome>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<Mutex<VecDeque<ScrapeJob>>>,
        launcher: Arc<dyn BrowserLauncher>,
        log_dir: Option<PathBuf>,
        outcomes: mpsc::UnboundedSender<JobOutcome>,
    ) -> Self {
        Self {
            id,
            queue,
            launcher,
            log_dir,
            outcomes,
        }
    }

    /// Runs the worker's main loop.
    pub async fn run(self) {
        debug!(worker_id = self.id, "Worker started");

        loop {
            let next = self.queue.lock().await.pop_front();
            let Some(job) = next else {
                break;
            };

            let catalog_year = job.catalog_year().to_owned();
            let start = Instant::now();
            info!(
                worker_id = self.id,
                catalog_year = catalog_year.as_str(),
                "Starting scraper"
            );

            let result = self.process_job(job).await;
            let duration = start.elapsed();

            match &result {
                Ok(done) => info!(
                    worker_id = self.id,
                    catalog_year = catalog_year.as_str(),
                    duration = fmt_duration(duration),
                    courses = done.records().len(),
                    external_links = done.external_links().len(),
                    skipped_rows = done.stats().skipped,
                    "Scrape finished"
                ),
                Err(e) => error!(
                    worker_id = self.id,
                    catalog_year = catalog_year.as_str(),
                    duration = fmt_duration(duration),
                    error = ?e,
                    "Scrape failed"
                ),
            }

            if self
                .outcomes
                .send(JobOutcome {
                    catalog_year,
                    result,
                })
                .is_err()
            {
                warn!(worker_id = self.id, "Outcome receiver dropped, stopping worker");
                break;
            }
        }

        debug!(worker_id = self.id, "Worker exiting, queue drained");
    }

    /// Runs one job, routing its events to the year's diagnostic log when one is configured.
    async fn process_job(&self, job: ScrapeJob) -> Result<CompletedJob, ScrapeError> {
        let launcher = self.launcher.as_ref();

        let Some(log_dir) = &self.log_dir else {
            return job.run(launcher).await;
        };

        match job_log::dispatch(log_dir, job.catalog_year()) {
            Ok(dispatch) => job.run(launcher).with_subscriber(dispatch).await,
            Err(e) => {
                warn!(
                    worker_id = self.id,
                    catalog_year = job.catalog_year(),
                    error = %e,
                    "Failed to open job log, logging to console"
                );
                job.run(launcher).await
            }
        }
    }
}
