//! Browser sessions driving the catalog UI.
//!
//! The catalog re-renders its listing whenever a row is expanded or
//! collapsed, so nothing here hands out element handles: every operation
//! addresses a row by its position and re-resolves it against the live page.

pub mod errors;
pub mod webdriver;

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub use errors::BrowserError;
pub use webdriver::WebDriverLauncher;

/// What the page did after a listing row was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// The in-page detail panel appeared.
    DetailPanel,
    /// A second window opened (the course links to an outside page).
    NewWindow,
}

/// One exclusively-owned browser session.
///
/// All calls are sequential; a session is never shared between jobs.
#[async_trait]
pub trait CatalogBrowser: Send {
    async fn goto(&mut self, url: &Url) -> Result<(), BrowserError>;

    /// Current document markup.
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Waits for the listing table and returns how many rows it currently has.
    async fn listing_rows(&mut self, timeout: Duration) -> Result<usize, BrowserError>;

    /// Title text of the interactive element in row `index`.
    async fn row_title(&mut self, index: usize) -> Result<String, BrowserError>;

    /// Clicks the interactive element in row `index`.
    async fn activate_row(&mut self, index: usize) -> Result<(), BrowserError>;

    /// Waits until either the detail panel is present or a second window has opened.
    async fn await_expansion(&mut self, timeout: Duration) -> Result<Expansion, BrowserError>;

    /// Outer HTML of the visible detail panel.
    async fn detail_markup(&mut self, timeout: Duration) -> Result<String, BrowserError>;

    /// Closes every window but the primary one and focuses the primary again.
    async fn close_secondary_window(&mut self) -> Result<(), BrowserError>;

    /// Waits until no detail panel is displayed.
    async fn await_collapse(&mut self, timeout: Duration) -> Result<(), BrowserError>;

    /// Ends the session. The browser must not be used afterwards.
    async fn quit(&mut self) -> Result<(), BrowserError>;
}

/// Opens fresh browser sessions, one per scrape job.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn CatalogBrowser>, BrowserError>;
}
