//! Error types for catalog page structure.

/// The catalog page doesn't have the structure the scraper depends on.
///
/// These are not retried: a catalog that lost its pagination control or
/// listing table needs a code change, not another attempt.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("pagination control not found")]
    MissingPagination,
    #[error("page indicator {0:?} does not end in a page count")]
    UnreadablePageCount(String),
    #[error("listing table did not render on page {page}")]
    MissingListing { page: u32 },
}
