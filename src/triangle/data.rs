//! Loss triangle data structures

use crate::error::{DiagnosticsError, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Quantity measured in a triangle's cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Cumulative amounts (losses, premiums, counts)
    Values,
    /// Age-to-age factors between adjacent development periods
    LinkRatios,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Values => "Values",
            ValueType::LinkRatios => "Link Ratios",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Values" | "values" => Ok(ValueType::Values),
            "Link Ratios" | "link-ratios" | "link_ratios" => Ok(ValueType::LinkRatios),
            other => Err(format!("Unknown value type: {}", other)),
        }
    }
}

/// One entry of the development axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Development {
    /// Age in months since the start of the origin period
    Age(u32),
    /// Interval between two ages, used by link ratios
    Interval { from: u32, to: u32 },
}

impl Development {
    /// Age in months at which the cell is observed
    pub fn months(&self) -> u32 {
        match self {
            Development::Age(months) => *months,
            Development::Interval { to, .. } => *to,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Development::Age(months) => months.to_string(),
            Development::Interval { from, to } => format!("{}-{}", from, to),
        }
    }
}

impl fmt::Display for Development {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A single link ratio together with its position in the triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkRatio {
    /// Origin index (row)
    pub origin: usize,
    /// Age-to-age factor
    pub value: f64,
    /// Calendar date at which the later of the two cells was observed
    pub valuation: NaiveDate,
}

/// A single-column loss triangle
///
/// Cells are indexed by `(origin, development)`; missing cells are `None`.
/// The triangular shape is typical but not required.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    column: String,
    value_type: ValueType,
    origins: Vec<NaiveDate>,
    development: Vec<Development>,
    cells: Vec<Vec<Option<f64>>>,
    valuations: Vec<Vec<NaiveDate>>,
}

impl Triangle {
    /// Create a triangle from explicit axes and a dense cell grid
    ///
    /// Origins and development periods must be strictly increasing, `cells`
    /// must be `origins.len()` rows of `development.len()` entries, and every
    /// present value must be finite.
    pub fn new(
        column: impl Into<String>,
        value_type: ValueType,
        origins: Vec<NaiveDate>,
        development: Vec<Development>,
        cells: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        let column = column.into();

        if origins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DiagnosticsError::InvalidTriangle(
                "origin periods must be strictly increasing".to_string(),
            ));
        }
        if development.windows(2).any(|w| w[0].months() >= w[1].months()) {
            return Err(DiagnosticsError::InvalidTriangle(
                "development periods must be strictly increasing".to_string(),
            ));
        }
        if cells.len() != origins.len() {
            return Err(DiagnosticsError::InvalidTriangle(format!(
                "{} rows supplied for {} origin periods",
                cells.len(),
                origins.len()
            )));
        }

        let mut valuations = Vec::with_capacity(origins.len());
        for (i, (origin, row)) in origins.iter().zip(&cells).enumerate() {
            if row.len() != development.len() {
                return Err(DiagnosticsError::InvalidTriangle(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    development.len()
                )));
            }
            if let Some(j) = row.iter().position(|c| c.is_some_and(|v| !v.is_finite())) {
                return Err(DiagnosticsError::InvalidTriangle(format!(
                    "{}[{}][{}] is not finite",
                    column, i, j
                )));
            }

            let mut row_valuations = Vec::with_capacity(development.len());
            for dev in &development {
                row_valuations.push(valuation_date(*origin, dev.months()).ok_or_else(|| {
                    DiagnosticsError::InvalidTriangle(format!(
                        "valuation date out of range for origin {} at {} months",
                        origin,
                        dev.months()
                    ))
                })?);
            }
            valuations.push(row_valuations);
        }

        Ok(Self {
            column,
            value_type,
            origins,
            development,
            cells,
            valuations,
        })
    }

    /// Create a cumulative triangle with annual origins from ragged rows
    ///
    /// Row `i` belongs to origin year `first_origin_year + i`; cells beyond a
    /// row's length are missing.
    pub fn from_rows(
        column: impl Into<String>,
        first_origin_year: i32,
        development_months: &[u32],
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let mut origins = Vec::with_capacity(rows.len());
        let mut cells = Vec::with_capacity(rows.len());

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() > development_months.len() {
                return Err(DiagnosticsError::InvalidTriangle(format!(
                    "row {} has {} values but only {} development periods",
                    i,
                    row.len(),
                    development_months.len()
                )));
            }
            let year = first_origin_year + i as i32;
            let origin = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| {
                DiagnosticsError::InvalidTriangle(format!("invalid origin year {}", year))
            })?;
            origins.push(origin);

            let mut dense: Vec<Option<f64>> = row.into_iter().map(Some).collect();
            dense.resize(development_months.len(), None);
            cells.push(dense);
        }

        let development = development_months.iter().map(|&m| Development::Age(m)).collect();
        Self::new(column, ValueType::Values, origins, development, cells)
    }

    /// Create a cumulative triangle from sparse `(origin, age in months) -> value` cells
    pub fn from_cells(
        column: impl Into<String>,
        cells: &BTreeMap<(NaiveDate, u32), f64>,
    ) -> Result<Self> {
        let mut origins: Vec<NaiveDate> = cells.keys().map(|(o, _)| *o).collect();
        origins.dedup();
        let mut ages: Vec<u32> = cells.keys().map(|(_, m)| *m).collect();
        ages.sort_unstable();
        ages.dedup();

        let mut dense = vec![vec![None; ages.len()]; origins.len()];
        for (&(origin, age), &value) in cells {
            // Both axes were built from the same keys
            if let (Ok(i), Ok(j)) = (origins.binary_search(&origin), ages.binary_search(&age)) {
                dense[i][j] = Some(value);
            }
        }

        let development = ages.into_iter().map(Development::Age).collect();
        Self::new(column, ValueType::Values, origins, development, dense)
    }

    /// Measurement column this triangle was taken from
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn origins(&self) -> &[NaiveDate] {
        &self.origins
    }

    pub fn development(&self) -> &[Development] {
        &self.development
    }

    pub fn n_origins(&self) -> usize {
        self.origins.len()
    }

    pub fn n_development(&self) -> usize {
        self.development.len()
    }

    /// Cell value; `None` when missing or out of bounds
    #[inline]
    pub fn get(&self, origin: usize, dev: usize) -> Option<f64> {
        self.cells.get(origin).and_then(|row| row.get(dev).copied().flatten())
    }

    /// Row of cells for one origin period
    pub fn row(&self, origin: usize) -> &[Option<f64>] {
        &self.cells[origin]
    }

    /// Number of observed cells
    pub fn cell_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Calendar date at which cell `(origin, dev)` is observed
    ///
    /// Panics if either index is out of bounds.
    pub fn valuation_date(&self, origin: usize, dev: usize) -> NaiveDate {
        self.valuations[origin][dev]
    }

    /// Latest valuation date among observed cells
    pub fn latest_valuation(&self) -> Option<NaiveDate> {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_some())
                    .map(move |(j, _)| (i, j))
            })
            .map(|(i, j)| self.valuations[i][j])
            .max()
    }

    /// Display label for an origin period: the year for annual origins, the date otherwise
    pub fn origin_label(&self, origin: usize) -> String {
        let date = self.origins[origin];
        if date.month() == 1 && date.day() == 1 {
            date.year().to_string()
        } else {
            date.format("%Y-%m-%d").to_string()
        }
    }

    /// Derive the link-ratio triangle (`C[i][j+1] / C[i][j]`)
    ///
    /// Ratios are missing where either cell is missing or the earlier cell is zero.
    pub fn link_ratios(&self) -> Result<Triangle> {
        if self.value_type == ValueType::LinkRatios {
            return Err(DiagnosticsError::InvalidTriangle(format!(
                "{} already holds link ratios",
                self.column
            )));
        }

        let development: Vec<Development> = self
            .development
            .windows(2)
            .map(|w| Development::Interval {
                from: w[0].months(),
                to: w[1].months(),
            })
            .collect();

        let cells = self
            .cells
            .iter()
            .map(|row| row.windows(2).map(|w| ratio(w[0], w[1])).collect())
            .collect();

        Triangle::new(
            self.column.clone(),
            ValueType::LinkRatios,
            self.origins.clone(),
            development,
            cells,
        )
    }

    /// Link ratios grouped by development column, in origin order
    ///
    /// A cumulative triangle yields `n_development - 1` columns; a link-ratio
    /// triangle yields its own cells.
    pub fn ratio_columns(&self) -> Vec<Vec<LinkRatio>> {
        match self.value_type {
            ValueType::Values => (0..self.n_development().saturating_sub(1))
                .map(|j| {
                    (0..self.n_origins())
                        .filter_map(|i| {
                            ratio(self.get(i, j), self.get(i, j + 1)).map(|value| LinkRatio {
                                origin: i,
                                value,
                                valuation: self.valuations[i][j + 1],
                            })
                        })
                        .collect()
                })
                .collect(),
            ValueType::LinkRatios => (0..self.n_development())
                .map(|j| {
                    (0..self.n_origins())
                        .filter_map(|i| {
                            self.get(i, j).map(|value| LinkRatio {
                                origin: i,
                                value,
                                valuation: self.valuations[i][j],
                            })
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// End of the period that starts at `origin` and lasts `months`
fn valuation_date(origin: NaiveDate, months: u32) -> Option<NaiveDate> {
    origin.checked_add_months(Months::new(months))?.pred_opt()
}

fn ratio(earlier: Option<f64>, later: Option<f64>) -> Option<f64> {
    match (earlier, later) {
        (Some(a), Some(b)) if a != 0.0 => Some(b / a).filter(|r| r.is_finite()),
        _ => None,
    }
}
