pub mod acalog;
pub mod app;
pub mod browser;
pub mod cli;
pub mod config;
pub mod export;
pub mod logging;
pub mod scraper;
pub mod utils;
