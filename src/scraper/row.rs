//! Drives one catalog listing row through expand → extract → collapse.

use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::acalog::{CourseRecord, extract_course};
use crate::browser::{BrowserError, CatalogBrowser, Expansion};
use crate::config::Timing;
use crate::scraper::job::DedupRegistry;

/// Where a row interaction currently stands.
///
/// `Idle → Expanding → {Redirected | DetailVisible} → Collapsing → Idle`.
/// A redirected row returns to `Idle` without collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Idle,
    Expanding,
    Redirected,
    DetailVisible,
    Collapsing,
}

/// Position of the row being driven, for log context.
#[derive(Debug, Clone, Copy)]
pub struct PageContext {
    pub page: u32,
    pub total_pages: u32,
    pub row: usize,
}

/// A row that could not be processed and was skipped.
#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    /// The state the row was in when the interaction failed.
    pub stage: RowState,
    pub error: BrowserError,
}

#[derive(Debug)]
pub enum RowOutcome {
    /// A new course; its code is now in the registry.
    Captured(Box<CourseRecord>),
    /// The panel held a course already captured by this job.
    Duplicate(String),
    /// The row opened an outside page; carries the row title for manual review.
    Redirected(String),
    Skipped(RowFailure),
}

/// Drives a single row of the current listing page.
pub struct RowController<'a> {
    browser: &'a mut dyn CatalogBrowser,
    registry: &'a mut DedupRegistry,
    timing: &'a Timing,
    state: RowState,
}

impl<'a> RowController<'a> {
    pub fn new(
        browser: &'a mut dyn CatalogBrowser,
        registry: &'a mut DedupRegistry,
        timing: &'a Timing,
    ) -> Self {
        Self {
            browser,
            registry,
            timing,
            state: RowState::Idle,
        }
    }

    /// Processes the row at `ctx.row`. Never fails: interaction errors become
    /// [`RowOutcome::Skipped`] so the caller can move on to the next row.
    pub async fn process(mut self, ctx: PageContext) -> RowOutcome {
        match self.expand(ctx).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    page = ctx.page,
                    row = ctx.row,
                    stage = ?self.state,
                    kind = error.kind(),
                    error = %error,
                    "Row skipped"
                );
                RowOutcome::Skipped(RowFailure {
                    row: ctx.row,
                    stage: self.state,
                    error,
                })
            }
        }
    }

    fn transition(&mut self, next: RowState) {
        trace!(from = ?self.state, to = ?next, "Row state change");
        self.state = next;
    }

    async fn expand(&mut self, ctx: PageContext) -> Result<RowOutcome, BrowserError> {
        self.transition(RowState::Expanding);
        let title = self.browser.row_title(ctx.row).await?;
        info!(page = ctx.page, row = ctx.row, title = title.as_str(), "Clicking row");
        self.browser.activate_row(ctx.row).await?;

        match self.browser.await_expansion(self.timing.expand_wait).await? {
            Expansion::NewWindow => {
                self.transition(RowState::Redirected);
                info!(row = ctx.row, title = title.as_str(), "External link detected");
                // The title is recorded even if the extra window refuses to close.
                if let Err(error) = self.browser.close_secondary_window().await {
                    warn!(row = ctx.row, error = %error, "Failed to close external window");
                }
                self.transition(RowState::Idle);
                Ok(RowOutcome::Redirected(title))
            }
            Expansion::DetailPanel => {
                self.transition(RowState::DetailVisible);
                let markup = self.browser.detail_markup(self.timing.detail_wait).await?;
                let outcome = self.register(extract_course(&markup));

                sleep(self.timing.row_pause).await;

                // The captured record is kept even if the panel won't close.
                if let Err(error) = self.collapse(ctx).await {
                    warn!(
                        row = ctx.row,
                        kind = error.kind(),
                        error = %error,
                        "Failed to collapse detail panel"
                    );
                }
                Ok(outcome)
            }
        }
    }

    fn register(&mut self, record: CourseRecord) -> RowOutcome {
        let code = record.dedup_key().to_owned();
        if self.registry.insert(&code) {
            info!(course_code = code.as_str(), "Scraped");
            RowOutcome::Captured(Box::new(record))
        } else {
            info!(course_code = code.as_str(), "Skipping duplicate");
            RowOutcome::Duplicate(code)
        }
    }

    async fn collapse(&mut self, ctx: PageContext) -> Result<(), BrowserError> {
        self.transition(RowState::Collapsing);
        // The listing re-rendered on expand; address the row by position again.
        self.browser.activate_row(ctx.row).await?;
        self.browser.await_collapse(self.timing.collapse_wait).await?;
        debug!(row = ctx.row, "Detail panel closed");
        self.transition(RowState::Idle);
        Ok(())
    }
}
