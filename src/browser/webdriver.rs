//! WebDriver-backed catalog sessions (chromedriver via `thirtyfour`).

use anyhow::Context;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use thirtyfour::WindowHandle;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::browser::{BrowserError, BrowserLauncher, CatalogBrowser, Expansion};
use crate::config::BrowserConfig;

/// The course listing is the last table on the page.
const LISTING_TABLE: &str = "table:last-of-type";
/// Cell holding the row's course title link.
const TITLE_CELL_CLASS: &str = "width";
/// Container class of an expanded course detail panel.
const DETAIL_PANEL_CLASS: &str = "coursepadding";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches one chromedriver session per call.
pub struct WebDriverLauncher {
    config: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn CatalogBrowser>, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.config.headless {
            caps.set_headless().context("Failed to request headless mode")?;
        }
        for arg in &self.config.args {
            caps.add_arg(arg)
                .with_context(|| format!("Failed to add browser argument {arg:?}"))?;
        }

        let driver = WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .with_context(|| {
                format!(
                    "Failed to start a session at {}",
                    self.config.webdriver_url
                )
            })?;
        let primary = driver
            .window()
            .await
            .context("Failed to read the primary window handle")?;

        debug!(webdriver_url = self.config.webdriver_url.as_str(), "Browser session started");
        Ok(Box::new(WebDriverSession { driver, primary }))
    }
}

/// A live chromedriver session focused on one catalog.
pub struct WebDriverSession {
    driver: WebDriver,
    primary: WindowHandle,
}

/// Maps a driver error onto the interaction failure it represents.
fn interaction_error(what: &'static str) -> impl FnOnce(WebDriverError) -> BrowserError {
    move |err| match err {
        WebDriverError::NoSuchElement(_) => BrowserError::MissingElement(what),
        WebDriverError::StaleElementReference(_) => BrowserError::StaleElement(what),
        other => BrowserError::Driver(anyhow::Error::new(other).context(what)),
    }
}

/// Polling budget for one bounded wait. Always allows at least one check.
struct Deadline {
    started: Instant,
    timeout: Duration,
    what: &'static str,
}

impl Deadline {
    fn start(timeout: Duration, what: &'static str) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            what,
        }
    }

    /// Sleeps one poll interval, or fails once the budget is spent.
    async fn tick(&self) -> Result<(), BrowserError> {
        let waited = self.started.elapsed();
        if waited >= self.timeout {
            return Err(BrowserError::Timeout {
                what: self.what,
                waited,
            });
        }
        sleep(POLL_INTERVAL.min(self.timeout - waited)).await;
        Ok(())
    }
}

impl WebDriverSession {
    async fn rows(&self) -> Result<Vec<WebElement>, BrowserError> {
        let table = self
            .driver
            .find(By::Css(LISTING_TABLE))
            .await
            .map_err(interaction_error("listing table"))?;
        table
            .find_all(By::Tag("tr"))
            .await
            .map_err(interaction_error("listing rows"))
    }

    /// Re-resolves row `index` against the current listing and returns its title link.
    async fn row_link(&self, index: usize) -> Result<WebElement, BrowserError> {
        let rows = self.rows().await?;
        let available = rows.len();
        let row = rows
            .into_iter()
            .nth(index)
            .ok_or(BrowserError::StaleRow { index, available })?;

        let cell = row
            .find(By::ClassName(TITLE_CELL_CLASS))
            .await
            .map_err(interaction_error("title cell"))?;
        cell.find(By::Tag("a"))
            .await
            .map_err(interaction_error("title link"))
    }

    async fn window_count(&self) -> Result<usize, BrowserError> {
        self.driver
            .windows()
            .await
            .map(|windows| windows.len())
            .map_err(interaction_error("window handles"))
    }

    async fn detail_panels(&self) -> Result<Vec<WebElement>, BrowserError> {
        self.driver
            .find_all(By::ClassName(DETAIL_PANEL_CLASS))
            .await
            .map_err(interaction_error("detail panel"))
    }

    /// The detail panel currently on screen, if any.
    async fn displayed_panel(&self) -> Result<Option<WebElement>, BrowserError> {
        let mut visibility = Vec::new();
        for panel in self.detail_panels().await? {
            let displayed = panel.is_displayed().await;
            visibility.push((panel, displayed));
        }
        first_displayed(visibility)
    }
}

/// Picks the first panel reporting itself displayed.
///
/// Collapsed rows can leave hidden or detached panels in the DOM; those never match.
fn first_displayed<T>(
    visibility: Vec<(T, Result<bool, WebDriverError>)>,
) -> Result<Option<T>, BrowserError> {
    for (panel, displayed) in visibility {
        match displayed {
            Ok(true) => return Ok(Some(panel)),
            Ok(false) | Err(WebDriverError::StaleElementReference(_)) => {}
            Err(e) => return Err(interaction_error("detail panel")(e)),
        }
    }
    Ok(None)
}

#[async_trait]
impl CatalogBrowser for WebDriverSession {
    async fn goto(&mut self, url: &Url) -> Result<(), BrowserError> {
        self.driver
            .goto(url.as_str())
            .await
            .with_context(|| format!("Failed to load {url}"))?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .driver
            .source()
            .await
            .context("Failed to read page source")?)
    }

    async fn listing_rows(&mut self, timeout: Duration) -> Result<usize, BrowserError> {
        let deadline = Deadline::start(timeout, "listing table");
        loop {
            match self.rows().await {
                Ok(rows) => return Ok(rows.len()),
                Err(BrowserError::MissingElement(_)) => deadline.tick().await?,
                Err(e) => return Err(e),
            }
        }
    }

    async fn row_title(&mut self, index: usize) -> Result<String, BrowserError> {
        self.row_link(index)
            .await?
            .text()
            .await
            .map_err(interaction_error("title link"))
    }

    async fn activate_row(&mut self, index: usize) -> Result<(), BrowserError> {
        self.row_link(index)
            .await?
            .click()
            .await
            .map_err(interaction_error("title link"))
    }

    async fn await_expansion(&mut self, timeout: Duration) -> Result<Expansion, BrowserError> {
        let deadline = Deadline::start(timeout, "detail panel or new window");
        loop {
            if self.window_count().await? > 1 {
                return Ok(Expansion::NewWindow);
            }
            if self.displayed_panel().await?.is_some() {
                return Ok(Expansion::DetailPanel);
            }
            deadline.tick().await?;
        }
    }

    async fn detail_markup(&mut self, timeout: Duration) -> Result<String, BrowserError> {
        let deadline = Deadline::start(timeout, "detail panel");
        loop {
            if let Some(panel) = self.displayed_panel().await? {
                return panel
                    .outer_html()
                    .await
                    .map_err(interaction_error("detail panel"));
            }
            deadline.tick().await?;
        }
    }

    async fn close_secondary_window(&mut self) -> Result<(), BrowserError> {
        let windows = self
            .driver
            .windows()
            .await
            .map_err(interaction_error("window handles"))?;

        for handle in windows.into_iter().filter(|h| *h != self.primary) {
            self.driver
                .switch_to_window(handle)
                .await
                .context("Failed to focus secondary window")?;
            self.driver
                .close_window()
                .await
                .context("Failed to close secondary window")?;
        }

        self.driver
            .switch_to_window(self.primary.clone())
            .await
            .context("Failed to refocus primary window")?;
        Ok(())
    }

    async fn await_collapse(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Deadline::start(timeout, "detail panel to close");
        while self.displayed_panel().await?.is_some() {
            deadline.tick().await?;
        }
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.driver
            .clone()
            .quit()
            .await
            .context("Failed to end browser session")?;
        Ok(())
    }
}
