//! Writes each completed catalog year to its own spreadsheet.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, XlsxError};

use crate::acalog::{CourseRecord, Credits, Field, NOT_AVAILABLE};
use crate::scraper::CompletedJob;

/// Worksheet holding the courses in each workbook.
pub const SHEET_NAME: &str = "Courses";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV to {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write workbook {}", path.display())]
    Xlsx {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
    #[error("failed to encode list cell")]
    Encode(#[from] serde_json::Error),
}

/// Destination for a finished job's records.
pub trait ExportSink: Send + Sync {
    /// Persists `job`'s records, returning where they went.
    fn export(&self, job: &CompletedJob) -> Result<PathBuf, ExportError>;
}

fn prepare_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// One `<catalog_year>.xlsx` per job with a single `Courses` sheet.
///
/// Fixed credits and repeat counts are numeric cells; every other cell is text
/// encoded the same way [`CsvSink`] encodes it.
#[derive(Debug, Clone)]
pub struct XlsxSink {
    output_dir: PathBuf,
}

impl XlsxSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, catalog_year: &str) -> PathBuf {
        self.output_dir.join(format!("{catalog_year}.xlsx"))
    }

    fn write(&self, path: &Path, records: &[CourseRecord]) -> Result<(), ExportError> {
        let xlsx_error = |source| ExportError::Xlsx {
            path: path.to_path_buf(),
            source,
        };

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME).map_err(xlsx_error)?;
        for (col, name) in (0u16..).zip(CourseRecord::COLUMNS) {
            sheet.write_string(0, col, name).map_err(xlsx_error)?;
        }
        for (line, record) in (1u32..).zip(records) {
            let numbers = numeric_cells(record);
            for (col, cell) in (0u16..).zip(row(record)?) {
                match numbers[usize::from(col)] {
                    Some(n) => sheet.write_number(line, col, n),
                    None => sheet.write_string(line, col, &cell),
                }
                .map_err(xlsx_error)?;
            }
        }
        workbook.save(path).map_err(xlsx_error)
    }
}

impl ExportSink for XlsxSink {
    fn export(&self, job: &CompletedJob) -> Result<PathBuf, ExportError> {
        prepare_dir(&self.output_dir)?;
        let path = self.path_for(job.catalog_year());
        self.write(&path, job.records())?;
        Ok(path)
    }
}

/// One `<catalog_year>.csv` per job, header row in canonical column order.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, catalog_year: &str) -> PathBuf {
        self.output_dir.join(format!("{catalog_year}.csv"))
    }

    fn write(&self, path: &Path, records: &[CourseRecord]) -> Result<(), ExportError> {
        let csv_error = |source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(CourseRecord::COLUMNS)
            .map_err(csv_error)?;
        for record in records {
            writer.write_record(row(record)?).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ExportSink for CsvSink {
    fn export(&self, job: &CompletedJob) -> Result<PathBuf, ExportError> {
        prepare_dir(&self.output_dir)?;
        let path = self.path_for(job.catalog_year());
        self.write(&path, job.records())?;
        Ok(path)
    }
}

/// Flattens a record into cells. Lists are stored as JSON arrays so they survive a round trip.
fn row(record: &CourseRecord) -> Result<[String; 8], ExportError> {
    Ok([
        text_cell(&record.course_code),
        text_cell(&record.course_name),
        display_cell(&record.credits),
        text_cell(&record.course_description),
        list_cell(&record.prereqs)?,
        list_cell(&record.coreqs)?,
        list_cell(&record.class_levels)?,
        display_cell(&record.repeats_allowed_for_credit),
    ])
}

/// Cells a spreadsheet should hold as numbers, by column.
fn numeric_cells(record: &CourseRecord) -> [Option<f64>; 8] {
    let mut numbers = [None; 8];
    if let Some(Credits::Fixed(units)) = record.credits.value() {
        numbers[2] = Some(f64::from(*units));
    }
    numbers[7] = record.repeats_allowed_for_credit.value().map(|n| f64::from(*n));
    numbers
}

fn text_cell(field: &Field<String>) -> String {
    field
        .value()
        .cloned()
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}

fn display_cell<T: std::fmt::Display>(field: &Field<T>) -> String {
    field
        .value()
        .map(ToString::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}

fn list_cell(field: &Field<Vec<String>>) -> Result<String, ExportError> {
    match field.value() {
        Some(items) => Ok(serde_json::to_string(items)?),
        None => Ok(NOT_AVAILABLE.to_owned()),
    }
}
