//! Scripted catalog browser for driving jobs without a WebDriver.
//!
//! Each catalog is keyed by its URL host. The fake browser serves a listing
//! page whose pagination indicator reads the scripted page count and replays
//! per-row behavior when rows are activated.

#![allow(dead_code)]

use acalog::acalog::listing::PAGE_PARAM;
use acalog::browser::{BrowserError, BrowserLauncher, CatalogBrowser, Expansion};
use acalog::config::Catalog;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// How one listing row behaves when clicked.
#[derive(Debug, Clone)]
pub enum RowScript {
    /// Opens an in-page detail panel with this markup.
    Detail { title: String, markup: String },
    /// Opens a second window.
    External { title: String },
    /// Nothing appears after the click.
    Unresponsive { title: String },
    /// The row's link goes stale before it can be clicked.
    Stale { title: String },
    /// The panel opens but never closes again.
    Sticky { title: String, markup: String },
    /// Clicking panics inside the session.
    Panic,
}

/// A detail-panel row for `code`, with a fixed-unit body.
pub fn course(code: &str, name: &str) -> RowScript {
    RowScript::Detail {
        title: format!("{code} - {name}"),
        markup: panel_markup(code, name),
    }
}

pub fn panel_markup(code: &str, name: &str) -> String {
    format!(
        r#"<td class="coursepadding"><div></div>
        <h3>{code}: {name}</h3>
        <hr>Units: 4<br>
        {name} for majors.<br>
        <strong>Prerequisite Courses:</strong> MATH 021 and CSE 015<br>
        </td>"#
    )
}

/// Listing page markup whose pagination control reports `pages` pages.
pub fn listing_page(pages: usize) -> String {
    format!(
        r#"<html><body>
        <table class="table_default"><tr><td>Filter</td></tr></table>
        <table class="table_default">
            <tr><td>Courses</td></tr>
            <tr><td>Page: 1 … {pages:02}</td></tr>
        </table>
        </body></html>"#
    )
}

/// The rows of every listing page of one catalog, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCatalog {
    pub pages: Vec<Vec<RowScript>>,
    /// Overrides the pagination-derived page count shown on the first page.
    pub advertised_pages: Option<usize>,
    /// How long each page takes to render.
    pub render_delay: Duration,
}

impl ScriptedCatalog {
    pub fn new(pages: Vec<Vec<RowScript>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn slow(mut self, render_delay: Duration) -> Self {
        self.render_delay = render_delay;
        self
    }
}

/// Counters shared by every session a launcher opened.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub launched: AtomicUsize,
    pub quit: AtomicUsize,
}

impl SessionLog {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn quit(&self) -> usize {
        self.quit.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    catalogs: Arc<HashMap<String, ScriptedCatalog>>,
    pub sessions: Arc<SessionLog>,
}

impl ScriptedLauncher {
    pub fn new(catalogs: impl IntoIterator<Item = (&'static str, ScriptedCatalog)>) -> Self {
        Self {
            catalogs: Arc::new(
                catalogs
                    .into_iter()
                    .map(|(host, catalog)| (host.to_owned(), catalog))
                    .collect(),
            ),
            sessions: Arc::default(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn CatalogBrowser>, BrowserError> {
        self.sessions.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedBrowser {
            catalogs: self.catalogs.clone(),
            sessions: self.sessions.clone(),
            current: None,
            page: 1,
            panel: None,
            windows: 1,
        }))
    }
}

/// A launcher whose browser crashes before a session exists.
#[derive(Debug, Default)]
pub struct CrashingLauncher {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl BrowserLauncher for CrashingLauncher {
    async fn launch(&self) -> Result<Box<dyn CatalogBrowser>, BrowserError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        panic!("chromedriver crashed during startup");
    }
}

/// The catalog a URL like `https://<host>/content.php?...` points at.
pub fn catalog_url(host: &str) -> Url {
    Url::parse(&format!(
        "https://{host}/content.php?catoid=24&navoid=2732&filter%5Bcpage%5D=1#acalog_template_course_filter"
    ))
    .unwrap()
}

pub fn catalog(year: &str, host: &str) -> Catalog {
    Catalog {
        year: year.to_owned(),
        url: catalog_url(host),
    }
}

struct ScriptedBrowser {
    catalogs: Arc<HashMap<String, ScriptedCatalog>>,
    sessions: Arc<SessionLog>,
    current: Option<String>,
    page: usize,
    /// Markup of the open detail panel and whether it refuses to close.
    panel: Option<(String, bool)>,
    windows: usize,
}

impl ScriptedBrowser {
    fn catalog(&self) -> Option<&ScriptedCatalog> {
        self.current.as_ref().and_then(|host| self.catalogs.get(host))
    }

    fn rows(&self) -> &[RowScript] {
        self.catalog()
            .and_then(|c| c.pages.get(self.page - 1))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn row(&self, index: usize) -> Result<&RowScript, BrowserError> {
        let rows = self.rows();
        rows.get(index).ok_or(BrowserError::StaleRow {
            index,
            available: rows.len(),
        })
    }
}

#[async_trait]
impl CatalogBrowser for ScriptedBrowser {
    async fn goto(&mut self, url: &Url) -> Result<(), BrowserError> {
        self.current = url.host_str().map(str::to_owned);
        self.page = url
            .query_pairs()
            .find(|(k, _)| k == PAGE_PARAM)
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);
        self.panel = None;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        if let Some(delay) = self.catalog().map(|c| c.render_delay) {
            tokio::time::sleep(delay).await;
        }
        match self.catalog() {
            Some(catalog) => Ok(listing_page(
                catalog.advertised_pages.unwrap_or(catalog.pages.len()),
            )),
            None => Ok("<html><body><p>Not Found</p></body></html>".to_owned()),
        }
    }

    async fn listing_rows(&mut self, timeout: Duration) -> Result<usize, BrowserError> {
        match self.catalog() {
            Some(catalog) if self.page <= catalog.pages.len() => Ok(self.rows().len()),
            _ => Err(BrowserError::Timeout {
                what: "listing table",
                waited: timeout,
            }),
        }
    }

    async fn row_title(&mut self, index: usize) -> Result<String, BrowserError> {
        match self.row(index)? {
            RowScript::Detail { title, .. }
            | RowScript::External { title }
            | RowScript::Unresponsive { title }
            | RowScript::Stale { title }
            | RowScript::Sticky { title, .. } => Ok(title.clone()),
            RowScript::Panic => Ok("Broken row".to_owned()),
        }
    }

    async fn activate_row(&mut self, index: usize) -> Result<(), BrowserError> {
        // A second click on an open panel collapses it.
        if let Some(sticky) = self.panel.as_ref().map(|(_, sticky)| *sticky) {
            if !sticky {
                self.panel = None;
            }
            return Ok(());
        }

        match self.row(index)?.clone() {
            RowScript::Detail { markup, .. } => self.panel = Some((markup, false)),
            RowScript::Sticky { markup, .. } => self.panel = Some((markup, true)),
            RowScript::External { .. } => self.windows += 1,
            RowScript::Unresponsive { .. } => {}
            RowScript::Stale { .. } => return Err(BrowserError::StaleElement("row link")),
            RowScript::Panic => panic!("scripted session crashed"),
        }
        Ok(())
    }

    async fn await_expansion(&mut self, timeout: Duration) -> Result<Expansion, BrowserError> {
        if self.windows > 1 {
            Ok(Expansion::NewWindow)
        } else if self.panel.is_some() {
            Ok(Expansion::DetailPanel)
        } else {
            Err(BrowserError::Timeout {
                what: "detail panel or new window",
                waited: timeout,
            })
        }
    }

    async fn detail_markup(&mut self, timeout: Duration) -> Result<String, BrowserError> {
        self.panel
            .as_ref()
            .map(|(markup, _)| markup.clone())
            .ok_or(BrowserError::Timeout {
                what: "detail panel",
                waited: timeout,
            })
    }

    async fn close_secondary_window(&mut self) -> Result<(), BrowserError> {
        self.windows = 1;
        Ok(())
    }

    async fn await_collapse(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let Some(sticky) = self.panel.as_ref().map(|(_, sticky)| *sticky) else {
            return Ok(());
        };
        // Sticky panels are dropped after timing out so later rows can still expand.
        if sticky {
            self.panel = None;
        }
        Err(BrowserError::Timeout {
            what: "detail panel to close",
            waited: timeout,
        })
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.sessions.quit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
