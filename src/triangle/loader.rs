//! Load multi-column triangles from long-format CSV and extract single columns
//!
//! Expected layout: one record per (origin, development[, business line]) with
//! one numeric field per measurement column:
//!
//! ```text
//! origin,development,business_line,paid,incurred
//! 2016,12,Auto,1000,1500
//! 2016,24,Auto,1800,2100
//! ```
//!
//! `origin` is a year (`2016`) or a date (`2016-01-01`); `development` is the
//! age in months. The `business_line` column (alias `lob`) is optional. Empty
//! or non-numeric measurement fields are treated as missing cells.

use super::data::Triangle;
use crate::error::{DiagnosticsError, Result};
use chrono::NaiveDate;
use csv::{Reader, StringRecord};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One record of a long-format triangle source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub origin: NaiveDate,
    /// Age in months
    pub development: u32,
    pub business_line: Option<String>,
    /// One entry per measurement column, aligned with `TriangleSource::columns`
    pub values: Vec<Option<f64>>,
}

/// A multi-column, optionally segmented triangle as loaded from disk
#[derive(Debug, Clone, Default)]
pub struct TriangleSource {
    columns: Vec<String>,
    records: Vec<SourceRecord>,
}

/// Supplies single-column triangles to the diagnostics engine
pub trait TriangleAccessor {
    /// Names of the measurement columns, in source order
    fn column_names(&self) -> Vec<String>;

    /// Extract one measurement column, optionally restricted to a business line
    fn get_column(&self, column: &str, business_line: Option<&str>) -> Result<Triangle>;
}

impl TriangleSource {
    /// Build a source from already-parsed records
    pub fn new(columns: Vec<String>, records: Vec<SourceRecord>) -> Result<Self> {
        if let Some(record) = records.iter().find(|r| r.values.len() != columns.len()) {
            return Err(DiagnosticsError::InvalidTriangle(format!(
                "record for origin {} at {} months has {} values, expected {}",
                record.origin,
                record.development,
                record.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, records })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    /// Distinct business lines, sorted
    pub fn business_lines(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.business_line.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl TriangleAccessor for TriangleSource {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn get_column(&self, column: &str, business_line: Option<&str>) -> Result<Triangle> {
        get_column(self, column, business_line)
    }
}

/// Extract a single-column triangle from a multi-column source
///
/// With a business line the records are filtered to that line; without one,
/// values are summed across lines. Duplicate cells are summed.
pub fn get_column(
    source: &TriangleSource,
    column: &str,
    business_line: Option<&str>,
) -> Result<Triangle> {
    let index = source
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| DiagnosticsError::ColumnNotFound {
            column: column.to_string(),
            available: source.columns.clone(),
        })?;

    if let Some(line) = business_line {
        if !source.records.iter().any(|r| r.business_line.as_deref() == Some(line)) {
            return Err(DiagnosticsError::BusinessLineNotFound(line.to_string()));
        }
    }

    let mut cells: BTreeMap<(NaiveDate, u32), f64> = BTreeMap::new();
    for record in &source.records {
        if business_line.is_some() && record.business_line.as_deref() != business_line {
            continue;
        }
        if let Some(value) = record.values[index] {
            *cells.entry((record.origin, record.development)).or_insert(0.0) += value;
        }
    }

    debug!(
        "Extracted column {} (business line {:?}): {} cells",
        column,
        business_line,
        cells.len()
    );
    Triangle::from_cells(column, &cells)
}

/// Load a triangle source from a CSV file
pub fn load_source<P: AsRef<Path>>(path: P) -> Result<TriangleSource> {
    let path = path.as_ref();
    let reader = Reader::from_path(path)?;
    let source = read_source(reader)?;
    info!(
        "Loaded {} records with columns [{}] from {}",
        source.records.len(),
        source.columns.join(", "),
        path.display()
    );
    Ok(source)
}

/// Load a triangle source from any reader (e.g., string buffer)
pub fn load_source_from_reader<R: std::io::Read>(reader: R) -> Result<TriangleSource> {
    read_source(Reader::from_reader(reader))
}

/// Positions of the structural fields within the header
struct Layout {
    origin: usize,
    development: usize,
    business_line: Option<usize>,
    measures: Vec<usize>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<(Self, Vec<String>)> {
        let mut origin = None;
        let mut development = None;
        let mut business_line = None;
        let mut measures = Vec::new();
        let mut columns = Vec::new();

        for (i, name) in headers.iter().enumerate() {
            match name.trim().to_ascii_lowercase().as_str() {
                "origin" => origin = Some(i),
                "development" => development = Some(i),
                "business_line" | "lob" => business_line = Some(i),
                _ => {
                    measures.push(i);
                    columns.push(name.trim().to_string());
                }
            }
        }

        let origin = origin.ok_or_else(|| {
            DiagnosticsError::InvalidTriangle("missing 'origin' header".to_string())
        })?;
        let development = development.ok_or_else(|| {
            DiagnosticsError::InvalidTriangle("missing 'development' header".to_string())
        })?;

        Ok((
            Self {
                origin,
                development,
                business_line,
                measures,
            },
            columns,
        ))
    }

    fn parse(&self, record: &StringRecord) -> Result<SourceRecord> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let origin = parse_origin(field(self.origin)).ok_or_else(|| {
            DiagnosticsError::InvalidTriangle(format!(
                "line {}: unrecognised origin '{}'",
                line,
                field(self.origin)
            ))
        })?;
        let development: u32 = field(self.development).parse().map_err(|_| {
            DiagnosticsError::InvalidTriangle(format!(
                "line {}: development '{}' is not a whole number of months",
                line,
                field(self.development)
            ))
        })?;
        let business_line = self
            .business_line
            .map(|i| field(i).to_string())
            .filter(|s| !s.is_empty());
        let values = self
            .measures
            .iter()
            .map(|&i| field(i).parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();

        Ok(SourceRecord {
            origin,
            development,
            business_line,
            values,
        })
    }
}

fn read_source<R: std::io::Read>(mut reader: Reader<R>) -> Result<TriangleSource> {
    let (layout, columns) = Layout::from_headers(reader.headers()?)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(layout.parse(&record)?);
    }

    TriangleSource::new(columns, records)
}

/// Accepts `2016` (start of year) or `2016-01-01`
fn parse_origin(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    text.parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}
