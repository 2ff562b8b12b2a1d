//! Catalog listing pagination.

use html_scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::acalog::errors::LayoutError;

/// Query parameter carrying the 1-based listing page (`filter%5Bcpage%5D` when encoded).
pub const PAGE_PARAM: &str = "filter[cpage]";

static PAGINATION_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.table_default").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Reads the total page count from a listing page's pagination control.
///
/// The control is the last `table.table_default` on the page; its last cell
/// reads like `Page: 1 2 3 ... 08`, so the trailing two characters hold the count.
pub fn total_pages(document: &str) -> Result<u32, LayoutError> {
    let html = Html::parse_document(document);

    let cell = html
        .select(&PAGINATION_TABLE)
        .last()
        .and_then(|table| table.select(&ROW).last())
        .and_then(|row| row.select(&CELL).last())
        .ok_or(LayoutError::MissingPagination)?;

    let text = cell.text().collect::<String>();
    let text = text.trim_end();
    let tail: String = {
        let mut tail: Vec<char> = text.chars().rev().take(2).collect();
        tail.reverse();
        tail.into_iter().collect()
    };

    match tail.trim().parse::<u32>() {
        Ok(pages) if pages > 0 => Ok(pages),
        _ => Err(LayoutError::UnreadablePageCount(text.to_owned())),
    }
}

/// Builds the URL of listing page `page` from the catalog's source URL.
///
/// Every other query pair (including repeated keys) and the fragment are kept
/// as-is; the page parameter is appended if the source URL lacks one.
pub fn page_url(source: &Url, page: u32) -> Url {
    let page = page.to_string();
    let mut pairs: Vec<(String, String)> = source.query_pairs().into_owned().collect();

    match pairs.iter_mut().find(|(key, _)| key == PAGE_PARAM) {
        Some((_, value)) => *value = page,
        None => pairs.push((PAGE_PARAM.to_owned(), page)),
    }

    let mut url = source.clone();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}
