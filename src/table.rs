// src/table.rs
// Tabular input (CSV / spreadsheet) and result output (CSV + XLSX)

use crate::conflict::pairs::{PairRow, unique_requirements};
use crate::conflict::record::ConflictRecord;
use crate::conflict::weights::WeightHistogram;
use crate::error::{ConflictError, Result};
use calamine::Reader;
use rust_xlsxwriter::Workbook;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REQUIREMENTS_COLUMN: &str = "Requirements";
pub const REQUIREMENT_1_COLUMN: &str = "Requirement_1";
pub const REQUIREMENT_2_COLUMN: &str = "Requirement_2";
pub const CONFLICT_TYPE_COLUMN: &str = "Conflict_Type";
pub const CONFLICT_REASON_COLUMN: &str = "Conflict_Reason";
pub const EXPECTED_CONFLICT_COLUMN: &str = "Expected_Conflict";
pub const EXPECTED_REASON_COLUMN: &str = "Expected_Reason";

/// Default output stem; `check` falls back to `<stem>.csv` when no file is given
pub const DEFAULT_RESULTS_STEM: &str = "conflict_results";

const RESULTS_SHEET: &str = "Results";

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Input table, shape detected from the header row
#[derive(Debug, Clone, PartialEq)]
pub enum InputTable {
    /// One `Requirements` column
    Flat(Vec<String>),
    /// `Requirement_1` / `Requirement_2` with optional labels
    Paired(Vec<PairRow>),
}

impl InputTable {
    /// Distinct requirement texts in first-seen order. Paired tables
    /// contribute both columns.
    pub fn requirements(&self) -> Vec<String> {
        match self {
            Self::Flat(reqs) => unique_requirements(reqs),
            Self::Paired(rows) => unique_requirements(
                rows.iter()
                    .flat_map(|r| [r.requirement_1.as_str(), r.requirement_2.as_str()]),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Flat(reqs) => reqs.len(),
            Self::Paired(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, Self::Paired(_))
    }
}

/// Load a CSV or spreadsheet file
pub fn load_table(path: &Path) -> Result<InputTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (headers, rows) = if extension == "csv" || extension == "txt" {
        read_csv(path)?
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        read_spreadsheet(path)?
    } else {
        return Err(ConflictError::UnsupportedFormat(format!(
            "{} (expected .csv or a spreadsheet)",
            path.display()
        )));
    };

    let table = build_table(path, &headers, rows)?;
    info!(
        path = %path.display(),
        rows = table.len(),
        paired = table.is_paired(),
        "Loaded input table"
    );
    Ok(table)
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn read_spreadsheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = calamine::open_workbook_auto(path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(ConflictError::InvalidInput(format!(
            "{} contains no worksheets",
            path.display()
        )));
    };
    debug!(sheet = %sheet, "Reading first worksheet");

    let range = workbook.worksheet_range(&sheet)?;
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<_>>());

    let headers = rows.next().unwrap_or_default();
    Ok((headers, rows.collect()))
}

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).map(|s| s.trim())
}

fn build_table(path: &Path, headers: &[String], rows: Vec<Vec<String>>) -> Result<InputTable> {
    let first = column_index(headers, REQUIREMENT_1_COLUMN);
    let second = column_index(headers, REQUIREMENT_2_COLUMN);

    if let (Some(first), Some(second)) = (first, second) {
        let conflict_type = column_index(headers, CONFLICT_TYPE_COLUMN);
        let conflict_reason = column_index(headers, CONFLICT_REASON_COLUMN);
        let pairs = rows
            .iter()
            .filter_map(|row| {
                let a = cell(row, Some(first))?;
                let b = cell(row, Some(second))?;
                if a.is_empty() || b.is_empty() {
                    return None;
                }
                Some(PairRow {
                    requirement_1: a.to_string(),
                    requirement_2: b.to_string(),
                    conflict_type: cell(row, conflict_type).map(str::to_string),
                    conflict_reason: cell(row, conflict_reason).map(str::to_string),
                })
            })
            .collect();
        return Ok(InputTable::Paired(pairs));
    }

    let Some(column) = column_index(headers, REQUIREMENTS_COLUMN) else {
        let missing = if first.is_some() || second.is_some() {
            if first.is_some() { REQUIREMENT_2_COLUMN } else { REQUIREMENT_1_COLUMN }
        } else {
            REQUIREMENTS_COLUMN
        };
        return Err(ConflictError::MissingColumn {
            column: missing.to_string(),
            path: path.display().to_string(),
        });
    };

    let requirements = rows
        .iter()
        .filter_map(|row| cell(row, Some(column)))
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect();
    Ok(InputTable::Flat(requirements))
}

/// Paths of one CSV + XLSX result pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
}

impl OutputPaths {
    /// `<base>.csv` and `<base>.xlsx`; any extension on `base` is replaced
    pub fn from_base(base: &Path) -> Self {
        Self {
            csv: base.with_extension("csv"),
            xlsx: base.with_extension("xlsx"),
        }
    }
}

/// Write `records` to `<base>.csv` and `<base>.xlsx`. Expected columns are
/// included when any record carries them.
pub fn write_results(records: &[ConflictRecord], base: &Path) -> Result<OutputPaths> {
    let paths = OutputPaths::from_base(base);
    if let Some(parent) = paths.csv.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let (header, rows) = result_rows(records);
    write_csv(&header, &rows, &paths.csv)?;
    write_xlsx(&header, &rows, &paths.xlsx)?;

    info!(
        records = records.len(),
        csv = %paths.csv.display(),
        xlsx = %paths.xlsx.display(),
        "Results written"
    );
    Ok(paths)
}

/// Header and cell rows shared by both output formats
fn result_rows(records: &[ConflictRecord]) -> (Vec<&'static str>, Vec<Vec<&str>>) {
    let with_expected = records.iter().any(ConflictRecord::has_expected);

    let mut header = vec![
        REQUIREMENT_1_COLUMN,
        REQUIREMENT_2_COLUMN,
        CONFLICT_TYPE_COLUMN,
        CONFLICT_REASON_COLUMN,
    ];
    if with_expected {
        header.extend([EXPECTED_CONFLICT_COLUMN, EXPECTED_REASON_COLUMN]);
    }

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![
                record.requirement_1.as_str(),
                record.requirement_2.as_str(),
                record.conflict_type.as_str(),
                record.conflict_reason.as_str(),
            ];
            if with_expected {
                row.push(record.expected_conflict.as_deref().unwrap_or(""));
                row.push(record.expected_reason.as_deref().unwrap_or(""));
            }
            row
        })
        .collect();
    (header, rows)
}

fn write_csv(header: &[&str], rows: &[Vec<&str>], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(header: &[&str], rows: &[Vec<&str>], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RESULTS_SHEET)?;

    for (col, name) in (0u16..).zip(header) {
        sheet.write_string(0, col, *name)?;
    }
    for (row_idx, row) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(row) {
            sheet.write_string(row_idx, col, *value)?;
        }
    }

    workbook.save(path)?;
    debug!(path = %path.display(), rows = rows.len(), "Spreadsheet written");
    Ok(())
}

/// Save a training histogram as a JSON object of label to weight
pub fn write_weights(weights: &WeightHistogram, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, weights)?;
    info!(labels = weights.len(), path = %path.display(), "Weights written");
    Ok(())
}

/// Load a histogram saved by [`write_weights`]. Non-positive entries are dropped.
pub fn load_weights(path: &Path) -> Result<WeightHistogram> {
    let reader = BufReader::new(File::open(path)?);
    let raw: BTreeMap<String, f64> = serde_json::from_reader(reader)?;

    let mut weights = WeightHistogram::new();
    for (label, weight) in &raw {
        weights.add(label, *weight);
    }
    info!(labels = weights.len(), path = %path.display(), "Weights loaded");
    Ok(weights)
}

/// `<base>_weights.json` next to a training output base
pub fn weights_path(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_RESULTS_STEM);
    base.with_file_name(format!("{}_weights.json", stem))
}

/// `<dir>/<stem>_partial_<timestamp>` next to `base`
pub fn partial_results_path(base: &Path, timestamp: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_RESULTS_STEM);
    base.with_file_name(format!("{}_partial_{}", stem, timestamp))
}

/// Timestamp used in partial result file names
pub fn timestamp_for_filename() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Persist an interrupted run's records under a timestamped name
pub fn write_partial_results(records: &[ConflictRecord], base: &Path) -> Result<OutputPaths> {
    let path = partial_results_path(base, &timestamp_for_filename());
    write_results(records, &path)
}
