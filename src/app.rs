use crate::browser::WebDriverLauncher;
use crate::cli::Args;
use crate::config::{Catalog, Config, ExportFormat};
use crate::export::{CsvSink, ExportSink, XlsxSink};
use crate::scraper::{Orchestrator, RunReport};
use crate::utils::{fmt_duration, fmt_seconds};
use anyhow::Context;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use yansi::Paint;

/// Main application struct: a validated configuration and the orchestrator built from it.
pub struct App {
    config: Config,
    catalogs: Vec<Catalog>,
    orchestrator: Orchestrator,
}

impl App {
    /// Applies command line overrides to `config` and wires up the browser launcher and export sink.
    pub fn new(mut config: Config, args: &Args) -> Result<Self, anyhow::Error> {
        if let Some(workers) = args.workers {
            config.workers = workers;
        }
        if let Some(output_dir) = &args.output_dir {
            config.output_dir = output_dir.clone();
        }

        let catalogs = config
            .catalogs(&args.years)
            .context("Invalid catalog configuration")?;
        if config.workers == 0 {
            anyhow::bail!("worker count must be at least 1");
        }

        let launcher = Arc::new(WebDriverLauncher::new(config.browser.clone()));
        let sink: Arc<dyn ExportSink> = match config.export_format {
            ExportFormat::Xlsx => Arc::new(XlsxSink::new(config.output_dir.clone())),
            ExportFormat::Csv => Arc::new(CsvSink::new(config.output_dir.clone())),
        };
        let orchestrator = Orchestrator::new(launcher, sink, config.workers, config.timing)
            .with_job_logs(config.log_dir.clone());

        info!(
            catalogs = ?catalogs.iter().map(|c| c.year.as_str()).collect::<Vec<_>>(),
            workers = config.workers,
            webdriver_url = config.browser.webdriver_url.as_str(),
            headless = config.browser.headless,
            output_dir = %config.output_dir.display(),
            export_format = ?config.export_format,
            "configuration loaded"
        );

        Ok(App {
            config,
            catalogs,
            orchestrator,
        })
    }

    /// Runs every job, prints the summary and records the elapsed time.
    ///
    /// Exits successfully only if every job completed and every export was written.
    pub async fn run(self) -> ExitCode {
        let started = Instant::now();
        let report = match self.orchestrator.run(self.catalogs).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Nothing to scrape");
                return ExitCode::FAILURE;
            }
        };
        let elapsed = started.elapsed();

        print_summary(&report, elapsed);

        if let Some(path) = &self.config.timing_file {
            match write_elapsed(path, elapsed) {
                Ok(()) => info!(path = %path.display(), "Elapsed time recorded"),
                Err(e) => warn!(error = ?e, "Failed to record elapsed time"),
            }
        }

        if report.is_success() {
            info!(duration = fmt_duration(elapsed), "All catalogs scraped");
            ExitCode::SUCCESS
        } else {
            error!(
                failed_jobs = report.failures.len(),
                failed_exports = report.exports.iter().filter(|e| e.result.is_err()).count(),
                "Run finished with failures"
            );
            ExitCode::FAILURE
        }
    }
}

fn write_elapsed(path: &Path, elapsed: Duration) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, fmt_seconds(elapsed))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(report: &RunReport, elapsed: Duration) {
    println!();
    println!("{}", "Run summary".bold());

    for job in &report.completed {
        let stats = job.stats();
        println!(
            "  {} {}: {} courses, {} pages, {} external, {} skipped rows ({})",
            "ok".green().bold(),
            job.catalog_year(),
            job.records().len(),
            stats.pages,
            job.external_links().len(),
            stats.skipped,
            fmt_duration(job.elapsed()),
        );
        println!("       {}", job.source_url().as_str().dim());
        for title in job.external_links() {
            println!("       {} {}", "manual review:".yellow(), title);
        }
    }

    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "failed".red().bold(),
            failure.catalog_year,
            error_chain(&failure.error),
        );
    }

    for export in &report.exports {
        match &export.result {
            Ok(path) => println!(
                "  {} {} -> {}",
                "saved".green(),
                export.catalog_year,
                path.display()
            ),
            Err(e) => println!(
                "  {} {}: {}",
                "not saved".red(),
                export.catalog_year,
                error_chain(e)
            ),
        }
    }

    println!("  elapsed {}", fmt_duration(elapsed).dim());
}

/// Renders an error with its `source` chain on one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
