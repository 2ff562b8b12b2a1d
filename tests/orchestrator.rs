//! Runs several catalog years through the worker pool.

mod helpers;

use acalog::acalog::CourseRecord;
use acalog::config::{ConfigError, Timing};
use acalog::export::{CsvSink, ExportError, ExportSink, SHEET_NAME, XlsxSink};
use calamine::{Reader, Xlsx, open_workbook};
use acalog::logging::job_log::log_path;
use acalog::scraper::{CompletedJob, Orchestrator, ScrapeError};
use helpers::{CrashingLauncher, RowScript, ScriptedCatalog, ScriptedLauncher, catalog, course};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Keeps exported course codes in memory, per catalog year.
#[derive(Default)]
struct RecordingSink {
    exports: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSink {
    fn exported(&self) -> Vec<(String, Vec<String>)> {
        let mut exports = self.exports.lock().unwrap().clone();
        exports.sort();
        exports
    }
}

impl ExportSink for RecordingSink {
    fn export(&self, job: &CompletedJob) -> Result<PathBuf, ExportError> {
        let codes = job
            .records()
            .iter()
            .map(|r| r.dedup_key().to_owned())
            .collect();
        self.exports
            .lock()
            .unwrap()
            .push((job.catalog_year().to_owned(), codes));
        Ok(PathBuf::from(format!("{}.mem", job.catalog_year())))
    }
}

fn two_catalogs() -> ScriptedLauncher {
    ScriptedLauncher::new([
        (
            "y2024.catalog.test",
            ScriptedCatalog::new(vec![
                vec![course("CSE 015", "Discrete Math")],
                vec![course("CSE 030", "Data Structures")],
            ]),
        ),
        (
            "y2025.catalog.test",
            ScriptedCatalog::new(vec![vec![
                course("CSE 150", "Operating Systems"),
                RowScript::External {
                    title: "CSE 195 - Internship".into(),
                },
            ]]),
        ),
    ])
}

// --- isolation ---

#[tokio::test]
async fn test_failed_job_does_not_block_others() {
    let launcher = Arc::new(two_catalogs());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(launcher.clone(), sink.clone(), 2, Timing::immediate());

    let report = orchestrator
        .run(vec![
            catalog("2023_2024", "missing.catalog.test"),
            catalog("2024_2025", "y2024.catalog.test"),
            catalog("2025_2026", "y2025.catalog.test"),
        ])
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].catalog_year, "2023_2024");
    assert!(matches!(report.failures[0].error, ScrapeError::Layout(_)));

    assert_eq!(
        sink.exported(),
        vec![
            (
                "2024_2025".to_owned(),
                vec!["CSE 015".to_owned(), "CSE 030".to_owned()]
            ),
            ("2025_2026".to_owned(), vec!["CSE 150".to_owned()]),
        ]
    );
    assert_eq!(launcher.sessions.launched(), 3);
    assert_eq!(launcher.sessions.quit(), 3);
}

#[tokio::test]
async fn test_all_jobs_succeed_with_single_worker() {
    let launcher = Arc::new(two_catalogs());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(launcher.clone(), sink.clone(), 1, Timing::immediate());

    let report = orchestrator
        .run(vec![
            catalog("2024_2025", "y2024.catalog.test"),
            catalog("2025_2026", "y2025.catalog.test"),
        ])
        .await
        .unwrap();

    assert!(report.is_success());
    // A single worker takes jobs in queue order.
    let years: Vec<_> = report.completed.iter().map(|j| j.catalog_year()).collect();
    assert_eq!(years, vec!["2024_2025", "2025_2026"]);
    assert_eq!(report.completed[1].external_links(), ["CSE 195 - Internship"]);
    assert_eq!(report.exports.len(), 2);
}

#[tokio::test]
async fn test_outcomes_in_completion_order() {
    let launcher = Arc::new(ScriptedLauncher::new([
        (
            "slow.catalog.test",
            ScriptedCatalog::new(vec![vec![course("CSE 015", "Discrete Math")]])
                .slow(Duration::from_millis(200)),
        ),
        (
            "fast.catalog.test",
            ScriptedCatalog::new(vec![vec![course("CSE 150", "Operating Systems")]]),
        ),
    ]));
    let orchestrator = Orchestrator::new(
        launcher,
        Arc::new(RecordingSink::default()),
        2,
        Timing::immediate(),
    );

    let report = orchestrator
        .run(vec![
            catalog("2024_2025", "slow.catalog.test"),
            catalog("2025_2026", "fast.catalog.test"),
        ])
        .await
        .unwrap();

    assert!(report.is_success());
    let years: Vec<_> = report.completed.iter().map(|j| j.catalog_year()).collect();
    assert_eq!(years, vec!["2025_2026", "2024_2025"]);
    let exported: Vec<_> = report.exports.iter().map(|e| e.catalog_year.as_str()).collect();
    assert_eq!(exported, vec!["2025_2026", "2024_2025"]);
}

#[tokio::test]
async fn test_launch_panic_fails_every_year() {
    let launcher = Arc::new(CrashingLauncher::default());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(launcher, sink.clone(), 1, Timing::immediate());

    let report = orchestrator
        .run(vec![
            catalog("2024_2025", "y2024.catalog.test"),
            catalog("2025_2026", "y2025.catalog.test"),
        ])
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(report.completed.is_empty());
    let mut failed: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.catalog_year.as_str())
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["2024_2025", "2025_2026"]);
    assert!(
        report
            .failures
            .iter()
            .all(|f| matches!(f.error, ScrapeError::Panicked(_)))
    );
    assert!(sink.exported().is_empty());
}

// --- validation ---

#[tokio::test]
async fn test_empty_catalog_list_rejected() {
    let orchestrator = Orchestrator::new(
        Arc::new(two_catalogs()),
        Arc::new(RecordingSink::default()),
        4,
        Timing::immediate(),
    );
    assert!(matches!(
        orchestrator.run(Vec::new()).await,
        Err(ConfigError::NoCatalogs)
    ));
}

#[tokio::test]
async fn test_zero_workers_rejected() {
    let launcher = Arc::new(two_catalogs());
    let orchestrator = Orchestrator::new(
        launcher.clone(),
        Arc::new(RecordingSink::default()),
        0,
        Timing::immediate(),
    );
    assert!(matches!(
        orchestrator
            .run(vec![catalog("2024_2025", "y2024.catalog.test")])
            .await,
        Err(ConfigError::NoWorkers)
    ));
    assert_eq!(launcher.sessions.launched(), 0);
}

// --- files ---

#[tokio::test]
async fn test_csv_export_and_job_logs() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("spreadsheets");
    let log_dir = dir.path().join("logs");

    let orchestrator = Orchestrator::new(
        Arc::new(two_catalogs()),
        Arc::new(CsvSink::new(&output_dir)),
        2,
        Timing::immediate(),
    )
    .with_job_logs(log_dir.clone());

    let report = orchestrator
        .run(vec![catalog("2024_2025", "y2024.catalog.test")])
        .await
        .unwrap();
    assert!(report.is_success());

    let path = report.exports[0].result.as_ref().unwrap();
    assert_eq!(path, &output_dir.join("2024_2025.csv"));

    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_owned)
        .collect();
    assert_eq!(headers, CourseRecord::COLUMNS);
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "CSE 015");
    assert_eq!(&rows[0][2], "4");
    assert_eq!(&rows[1][4], r#"["MATH 021","CSE 015"]"#);

    // A second run replaces the year's file rather than appending to it.
    let rerun = Orchestrator::new(
        Arc::new(ScriptedLauncher::new([(
            "y2024.catalog.test",
            ScriptedCatalog::new(vec![vec![course("CSE 100", "Algorithms")]]),
        )])),
        Arc::new(CsvSink::new(&output_dir)),
        1,
        Timing::immediate(),
    )
    .run(vec![catalog("2024_2025", "y2024.catalog.test")])
    .await
    .unwrap();
    assert!(rerun.is_success());
    let mut reader = csv::Reader::from_path(&output_dir.join("2024_2025.csv")).unwrap();
    let codes: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[0].to_owned())
        .collect();
    assert_eq!(codes, vec!["CSE 100"]);

    let log = std::fs::read_to_string(log_path(&log_dir, "2024_2025")).unwrap();
    assert!(log.contains("CSE 030"), "job log was: {log}");
}

#[tokio::test]
async fn test_xlsx_export_per_year() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(two_catalogs()),
        Arc::new(XlsxSink::new(dir.path())),
        2,
        Timing::immediate(),
    );

    let report = orchestrator
        .run(vec![
            catalog("2024_2025", "y2024.catalog.test"),
            catalog("2025_2026", "y2025.catalog.test"),
        ])
        .await
        .unwrap();
    assert!(report.is_success());

    let path = dir.path().join("2025_2026.xlsx");
    let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();
    let codes: Vec<String> = range.rows().map(|cells| cells[0].to_string()).collect();
    assert_eq!(codes, vec!["course_code", "CSE 150"]);
    assert!(dir.path().join("2024_2025.xlsx").exists());
}
