//! Display-agnostic header-labeled grids

use crate::diagnostics::{CorrelationTestResult, Outcome};
use crate::triangle::{Triangle, ValueType};
use serde::Serialize;

/// Header of the single column of a result grid
pub const PASS_FAIL_HEADER: &str = "Pass/Fail";

/// Row header used when an aggregate result is projected
pub const TOTAL_ROW_HEADER: &str = "All Years";

/// A 2-D table of display strings with row and column headers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultGrid {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `cells[row][column]`
    pub cells: Vec<Vec<String>>,
}

impl ResultGrid {
    /// Project a result: one row per valuation period, one "Pass/Fail" column
    ///
    /// Rows follow the result's label order. An aggregate result becomes a
    /// single row.
    pub fn from_result(result: &CorrelationTestResult) -> Self {
        let (row_labels, cells) = match &result.outcome {
            Outcome::Aggregate(agg) => (
                vec![TOTAL_ROW_HEADER.to_string()],
                vec![vec![agg.verdict.label().to_string()]],
            ),
            Outcome::PerPeriod(periods) => (
                periods.iter().map(|p| p.label.clone()).collect(),
                periods
                    .iter()
                    .map(|p| vec![p.verdict.label().to_string()])
                    .collect(),
            ),
        };

        Self {
            row_labels,
            column_labels: vec![PASS_FAIL_HEADER.to_string()],
            cells,
        }
    }

    /// Origin rows by development columns; missing cells are empty strings
    pub fn from_triangle(triangle: &Triangle) -> Self {
        let decimals = match triangle.value_type() {
            ValueType::Values => 2,
            ValueType::LinkRatios => 4,
        };

        Self {
            row_labels: (0..triangle.n_origins())
                .map(|i| triangle.origin_label(i))
                .collect(),
            column_labels: triangle.development().iter().map(|d| d.label()).collect(),
            cells: (0..triangle.n_origins())
                .map(|i| {
                    triangle
                        .row(i)
                        .iter()
                        .map(|c| c.map(|v| format!("{:.*}", decimals, v)).unwrap_or_default())
                        .collect()
                })
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_labels.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_labels.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.cells.get(row)?.get(column).map(String::as_str)
    }

    /// Swap rows and columns
    pub fn transposed(&self) -> Self {
        let cells = (0..self.column_count())
            .map(|c| {
                (0..self.row_count())
                    .map(|r| self.cell(r, c).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        Self {
            row_labels: self.column_labels.clone(),
            column_labels: self.row_labels.clone(),
            cells,
        }
    }

    /// Plain-text rendering with right-aligned columns
    pub fn render(&self) -> String {
        let label_width = self.row_labels.iter().map(String::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..self.column_count())
            .map(|c| {
                (0..self.row_count())
                    .filter_map(|r| self.cell(r, c))
                    .map(str::len)
                    .chain(std::iter::once(self.column_labels[c].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = format!("{:label_width$}", "");
        for (label, width) in self.column_labels.iter().zip(&widths) {
            out.push_str(&format!("  {:>width$}", label, width = width));
        }
        out.push('\n');

        for (r, label) in self.row_labels.iter().enumerate() {
            out.push_str(&format!("{:label_width$}", label));
            for (c, width) in widths.iter().enumerate() {
                let cell = self.cell(r, c).unwrap_or_default();
                out.push_str(&format!("  {:>width$}", cell, width = width));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::fixtures::calendar_shock_triangle;
    use crate::diagnostics::{development_correlation, valuation_correlation};

    #[test]
    fn test_per_period_projection() {
        let tri = calendar_shock_triangle();
        let result = valuation_correlation(&tri, 0.10, false).unwrap();
        let grid = ResultGrid::from_result(&result);

        assert_eq!(grid.row_labels, result.labels());
        assert_eq!(grid.column_labels, vec![PASS_FAIL_HEADER]);
        assert_eq!(grid.cell(0, 0), Some("Insufficient Data"));
        assert_eq!(grid.cell(2, 0), Some("Fail"));
        assert_eq!(grid.cell(4, 0), None);
    }

    #[test]
    fn test_aggregate_projection() {
        let tri = calendar_shock_triangle();
        let result = development_correlation(&tri, 0.5).unwrap();
        let grid = ResultGrid::from_result(&result);
        assert_eq!(grid.row_count(), 1);
        assert_eq!(grid.row_labels, vec![TOTAL_ROW_HEADER]);
    }

    #[test]
    fn test_transposed() {
        let tri = calendar_shock_triangle();
        let grid = ResultGrid::from_result(&valuation_correlation(&tri, 0.05, false).unwrap());
        let wide = grid.transposed();
        assert_eq!(wide.row_count(), 1);
        assert_eq!(wide.column_labels, grid.row_labels);
        assert_eq!(wide.cell(0, 3), Some("Pass"));
        assert_eq!(wide.transposed(), grid);
    }

    #[test]
    fn test_triangle_grid() {
        let tri = Triangle::from_rows(
            "paid",
            2020,
            &[12, 24],
            vec![vec![100.0, 250.0], vec![120.0]],
        )
        .unwrap();
        let values = ResultGrid::from_triangle(&tri);
        assert_eq!(values.row_labels, vec!["2020", "2021"]);
        assert_eq!(values.column_labels, vec!["12", "24"]);
        assert_eq!(values.cell(0, 1), Some("250.00"));
        assert_eq!(values.cell(1, 1), Some(""));

        let ratios = ResultGrid::from_triangle(&tri.link_ratios().unwrap());
        assert_eq!(ratios.column_labels, vec!["12-24"]);
        assert_eq!(ratios.cell(0, 0), Some("2.5000"));
    }

    #[test]
    fn test_render_aligns_columns() {
        let tri = calendar_shock_triangle();
        let text = ResultGrid::from_result(&valuation_correlation(&tri, 0.10, false).unwrap())
            .render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("        Pass/Fail"));
        assert!(lines[3].starts_with("2019-12-31"));
        assert!(lines[3].ends_with("Fail"));
    }
}
