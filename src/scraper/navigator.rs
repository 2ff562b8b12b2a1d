//! Walks every listing page of a catalog and drives each of its rows.

use tokio::time::sleep;
use tracing::{Instrument, info, info_span};
use url::Url;

use crate::acalog::LayoutError;
use crate::acalog::listing::{page_url, total_pages};
use crate::browser::{BrowserError, CatalogBrowser};
use crate::config::Timing;
use crate::scraper::errors::ScrapeError;
use crate::scraper::job::Harvest;
use crate::scraper::row::{PageContext, RowController};

pub struct PageNavigator<'a> {
    browser: &'a mut dyn CatalogBrowser,
    timing: &'a Timing,
}

impl<'a> PageNavigator<'a> {
    pub fn new(browser: &'a mut dyn CatalogBrowser, timing: &'a Timing) -> Self {
        Self { browser, timing }
    }

    /// Reads the page count from `first_page`, then visits pages `1..=total`
    /// in order, driving every row of each.
    pub async fn run(
        &mut self,
        source: &Url,
        first_page: &str,
        harvest: &mut Harvest,
    ) -> Result<(), ScrapeError> {
        let total = total_pages(first_page)?;
        info!(total_pages = total, "Total number of pages in pagination");

        for page in 1..=total {
            let span = info_span!("page", page, total_pages = total);
            self.visit(source, page, total, harvest)
                .instrument(span)
                .await?;
        }
        Ok(())
    }

    async fn visit(
        &mut self,
        source: &Url,
        page: u32,
        total: u32,
        harvest: &mut Harvest,
    ) -> Result<(), ScrapeError> {
        let url = page_url(source, page);
        info!(url = %url, "Scraping page {page}/{total}");

        self.browser
            .goto(&url)
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.to_string(),
                source,
            })?;
        sleep(self.timing.page_settle).await;

        let rows = match self.browser.listing_rows(self.timing.listing_wait).await {
            Ok(rows) => rows,
            Err(BrowserError::Timeout { .. } | BrowserError::MissingElement(_)) => {
                return Err(LayoutError::MissingListing { page }.into());
            }
            Err(source) => {
                return Err(ScrapeError::Navigation {
                    url: url.to_string(),
                    source,
                });
            }
        };
        harvest.page_visited();

        // Rows are addressed by position; the controller re-resolves each one.
        for row in 0..rows {
            let ctx = PageContext {
                page,
                total_pages: total,
                row,
            };
            let outcome = RowController::new(&mut *self.browser, &mut harvest.registry, self.timing)
                .process(ctx)
                .await;
            harvest.absorb(outcome);
        }

        info!(rows, "Finished page {page}/{total}");
        Ok(())
    }
}
