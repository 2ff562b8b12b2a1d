use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Scrapes Acalog course catalogs into one spreadsheet per catalog year.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (missing files fall back to defaults and `ACALOG_*` variables)
    #[arg(short, long, default_value = "acalog.toml")]
    pub config: PathBuf,

    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    /// Number of catalog years scraped concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Only scrape these catalog years (repeatable)
    #[arg(short, long = "year", value_name = "YEAR")]
    pub years: Vec<String>,

    /// Directory receiving the exported spreadsheets
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Compact human-readable output
    Pretty,
    /// One JSON object per event
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_repeated_years_and_overrides() {
        let args = Args::parse_from([
            "acalog",
            "--year",
            "2024_2025",
            "-y",
            "2025_2026",
            "--workers",
            "2",
            "--tracing",
            "json",
        ]);
        assert_eq!(args.years, vec!["2024_2025", "2025_2026"]);
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.tracing, TracingFormat::Json);
        assert_eq!(args.config, PathBuf::from("acalog.toml"));
        assert!(args.output_dir.is_none());
    }
}
