//! One catalog year's scrape, from browser launch to released session.

use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::acalog::CourseRecord;
use crate::browser::{BrowserLauncher, CatalogBrowser};
use crate::config::{Catalog, Timing};
use crate::scraper::errors::ScrapeError;
use crate::scraper::navigator::PageNavigator;
use crate::scraper::row::RowOutcome;

/// Course codes already captured by one job.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: HashSet<String>,
}

impl DedupRegistry {
    /// Registers `code`, returning `false` if it was already present.
    pub fn insert(&mut self, code: &str) -> bool {
        if self.seen.contains(code) {
            return false;
        }
        self.seen.insert(code.to_owned())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Counters describing one job's run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub pages: u32,
    pub rows: usize,
    pub captured: usize,
    pub duplicates: usize,
    pub redirected: usize,
    pub skipped: usize,
}

/// Everything a job accumulates while navigating. Owned by the job's task alone.
#[derive(Debug, Default)]
pub struct Harvest {
    pub registry: DedupRegistry,
    records: Vec<CourseRecord>,
    external_links: Vec<String>,
    stats: JobStats,
}

impl Harvest {
    pub fn absorb(&mut self, outcome: RowOutcome) {
        self.stats.rows += 1;
        match outcome {
            RowOutcome::Captured(record) => {
                self.stats.captured += 1;
                self.records.push(*record);
            }
            RowOutcome::Duplicate(_) => self.stats.duplicates += 1,
            RowOutcome::Redirected(title) => {
                self.stats.redirected += 1;
                self.external_links.push(title);
            }
            RowOutcome::Skipped(_) => self.stats.skipped += 1,
        }
    }

    pub fn page_visited(&mut self) {
        self.stats.pages += 1;
    }
}

/// A catalog year waiting to be scraped.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    catalog: Catalog,
    timing: Timing,
}

impl ScrapeJob {
    pub fn new(catalog: Catalog, timing: Timing) -> Self {
        Self { catalog, timing }
    }

    pub fn catalog_year(&self) -> &str {
        &self.catalog.year
    }

    /// Launches a browser session, scrapes every listing page, and releases the
    /// session whatever the outcome. Panics while launching or scraping become
    /// [`ScrapeError::Panicked`].
    pub async fn run(self, launcher: &dyn BrowserLauncher) -> Result<CompletedJob, ScrapeError> {
        let started = Instant::now();
        let mut browser = match AssertUnwindSafe(launcher.launch()).catch_unwind().await {
            Ok(launched) => launched.map_err(ScrapeError::Launch)?,
            Err(panic) => return Err(ScrapeError::Panicked(panic_message(panic.as_ref()))),
        };
        let mut harvest = Harvest::default();

        let result = AssertUnwindSafe(self.scrape(browser.as_mut(), &mut harvest))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ScrapeError::Panicked(panic_message(panic.as_ref()))));

        match browser.quit().await {
            Ok(()) => info!(catalog_year = self.catalog.year.as_str(), "Driver closed"),
            Err(e) => warn!(
                catalog_year = self.catalog.year.as_str(),
                error = %e,
                "Failed to close browser session"
            ),
        }
        result?;

        info!(
            catalog_year = self.catalog.year.as_str(),
            courses = harvest.records.len(),
            unique_codes = harvest.registry.len(),
            external_links = harvest.external_links.len(),
            "Scraping completed"
        );
        for title in &harvest.external_links {
            info!(title = title.as_str(), "External link deferred for manual review");
        }

        Ok(CompletedJob {
            catalog_year: self.catalog.year,
            source_url: self.catalog.url,
            records: harvest.records,
            external_links: harvest.external_links,
            stats: harvest.stats,
            elapsed: started.elapsed(),
        })
    }

    async fn scrape(
        &self,
        browser: &mut dyn CatalogBrowser,
        harvest: &mut Harvest,
    ) -> Result<(), ScrapeError> {
        let url = &self.catalog.url;
        info!(catalog_year = self.catalog.year.as_str(), url = %url, "Loading catalog");
        browser
            .goto(url)
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.to_string(),
                source,
            })?;
        sleep(self.timing.initial_settle).await;

        let first_page = browser
            .page_source()
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.to_string(),
                source,
            })?;

        PageNavigator::new(browser, &self.timing)
            .run(url, &first_page, harvest)
            .await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// A finished job's results, read-only.
#[derive(Debug)]
pub struct CompletedJob {
    catalog_year: String,
    source_url: Url,
    records: Vec<CourseRecord>,
    external_links: Vec<String>,
    stats: JobStats,
    elapsed: Duration,
}

impl CompletedJob {
    pub fn catalog_year(&self) -> &str {
        &self.catalog_year
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    /// Captured courses in listing order, unique by course code.
    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    /// Titles of rows that opened an outside page.
    pub fn external_links(&self) -> &[String] {
        &self.external_links
    }

    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::scraper::row::{RowFailure, RowState};

    fn record(code: &str) -> Box<CourseRecord> {
        Box::new(CourseRecord {
            course_code: crate::acalog::Field::Value(code.to_owned()),
            ..Default::default()
        })
    }

    #[test]
    fn test_registry_rejects_repeat_codes() {
        let mut registry = DedupRegistry::default();
        assert!(registry.insert("CSE 150"));
        assert!(!registry.insert("CSE 150"));
        assert!(registry.insert("CSE 160"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_harvest_counts_every_outcome() {
        let mut harvest = Harvest::default();
        harvest.absorb(RowOutcome::Captured(record("CSE 150")));
        harvest.absorb(RowOutcome::Duplicate("CSE 150".into()));
        harvest.absorb(RowOutcome::Redirected("ENGR 190: Abroad".into()));
        harvest.absorb(RowOutcome::Skipped(RowFailure {
            row: 3,
            stage: RowState::Expanding,
            error: BrowserError::StaleRow {
                index: 3,
                available: 2,
            },
        }));

        assert_eq!(
            harvest.stats,
            JobStats {
                pages: 0,
                rows: 4,
                captured: 1,
                duplicates: 1,
                redirected: 1,
                skipped: 1,
            }
        );
        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.external_links, vec!["ENGR 190: Abroad"]);
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
