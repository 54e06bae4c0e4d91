//! Analysis session: diagnostics for every measurement column of a source
//!
//! Loads each column once, then keeps three independently parameterized
//! diagnostics per column current as their critical values change.

use crate::binding::{
    summarize, AggregateStatusLabel, CriticalValue, ResultGrid, TableProjection, ThresholdBinding,
};
use crate::config::DiagnosticsConfig;
use crate::diagnostics::{CorrelationTestResult, TestKind, TestRequest};
use crate::error::{DiagnosticsError, Result};
use crate::triangle::{load_source, Triangle, TriangleAccessor, TriangleSource, ValueType};
use log::info;
use serde::Serialize;
use std::path::Path;
use std::rc::Rc;

/// Diagnostics for one measurement column
///
/// Each of the three diagnostics owns its critical value, so changing one
/// recomputes only that diagnostic.
#[derive(Debug)]
pub struct ColumnDiagnostics {
    triangle: Rc<Triangle>,
    valuation_total: AggregateStatusLabel,
    valuation_by_period: TableProjection,
    development: AggregateStatusLabel,
}

impl ColumnDiagnostics {
    pub fn new(triangle: Triangle, config: &DiagnosticsConfig) -> Result<Self> {
        config.validate()?;
        let triangle = Rc::new(triangle);

        let valuation_total = AggregateStatusLabel::bind(
            &CriticalValue::new(config.valuation_critical)?,
            Rc::clone(&triangle),
            TestKind::ValuationCorrelation,
        )?;
        let valuation_by_period = TableProjection::new(ThresholdBinding::bind(
            &CriticalValue::new(config.valuation_critical)?,
            Rc::clone(&triangle),
            TestRequest::ValuationByPeriod,
        )?);
        let development = AggregateStatusLabel::bind(
            &CriticalValue::new(config.development_critical)?,
            Rc::clone(&triangle),
            TestKind::DevelopmentCorrelation,
        )?;

        Ok(Self {
            triangle,
            valuation_total,
            valuation_by_period,
            development,
        })
    }

    pub fn column(&self) -> &str {
        self.triangle.column()
    }

    pub fn triangle(&self) -> &Rc<Triangle> {
        &self.triangle
    }

    /// Valuation correlation over all years
    pub fn valuation_total(&self) -> &AggregateStatusLabel {
        &self.valuation_total
    }

    /// Valuation correlation for each valuation period
    pub fn valuation_by_period(&self) -> &TableProjection {
        &self.valuation_by_period
    }

    pub fn development(&self) -> &AggregateStatusLabel {
        &self.development
    }

    pub fn bindings(&self) -> [&ThresholdBinding; 3] {
        [
            self.valuation_total.binding(),
            self.valuation_by_period.binding(),
            self.development.binding(),
        ]
    }

    /// Swap in a reloaded triangle for this column
    ///
    /// Every diagnostic re-runs at its current critical value and notifies
    /// its listeners; the tabular projection emits `StructureChanged`. The
    /// triangle must carry the same column name. On failure every diagnostic
    /// keeps its previous triangle.
    pub fn replace_triangle(&mut self, triangle: Triangle) -> Result<()> {
        if triangle.column() != self.column() {
            return Err(DiagnosticsError::InvalidTriangle(format!(
                "replacement for column '{}' has column '{}'",
                self.column(),
                triangle.column()
            )));
        }

        let triangle = Rc::new(triangle);
        let bindings = self.bindings();
        for (done, binding) in bindings.iter().enumerate() {
            if let Err(e) = binding.replace_triangle(Rc::clone(&triangle)) {
                for replaced in &bindings[..done] {
                    replaced.replace_triangle(Rc::clone(&self.triangle))?;
                }
                return Err(e);
            }
        }

        info!(
            "Replaced {} triangle: {} origin periods x {} development periods",
            triangle.column(),
            triangle.n_origins(),
            triangle.n_development()
        );
        self.triangle = triangle;
        Ok(())
    }

    /// Values or link ratios as a display grid
    pub fn display_grid(&self, value_type: ValueType) -> Result<ResultGrid> {
        match (self.triangle.value_type(), value_type) {
            (current, wanted) if current == wanted => Ok(ResultGrid::from_triangle(&self.triangle)),
            (ValueType::Values, ValueType::LinkRatios) => {
                Ok(ResultGrid::from_triangle(&self.triangle.link_ratios()?))
            }
            (current, wanted) => Err(DiagnosticsError::InvalidTriangle(format!(
                "cannot display {} as {}",
                current, wanted
            ))),
        }
    }

    /// Snapshot of the current results
    pub fn report(&self) -> ColumnReport {
        ColumnReport {
            column: self.column().to_string(),
            origins: self.triangle.n_origins(),
            development_periods: self.triangle.n_development(),
            tests: self.bindings().iter().map(|b| TestReport::from_binding(b)).collect(),
        }
    }
}

/// Serializable snapshot of one bound diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub title: String,
    pub critical_value: f64,
    /// Status line for aggregate results
    pub status: Option<String>,
    pub grid: ResultGrid,
    pub result: CorrelationTestResult,
}

impl TestReport {
    pub fn from_binding(binding: &ThresholdBinding) -> Self {
        let result = binding.current_result();
        Self {
            title: binding.request().title().to_string(),
            critical_value: result.critical_value,
            status: summarize(&result).ok(),
            grid: ResultGrid::from_result(&result),
            result: (*result).clone(),
        }
    }
}

/// Serializable snapshot of one column's diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub column: String,
    pub origins: usize,
    pub development_periods: usize,
    /// Valuation (all years), valuation (individual years), development
    pub tests: Vec<TestReport>,
}

/// Every measurement column of a source with its diagnostics, in source order
#[derive(Debug)]
pub struct AnalysisSession {
    config: DiagnosticsConfig,
    columns: Vec<ColumnDiagnostics>,
}

impl AnalysisSession {
    /// Analyse every column of `source`
    pub fn new<A: TriangleAccessor>(source: &A, config: DiagnosticsConfig) -> Result<Self> {
        Self::with_columns(source, &source.column_names(), config)
    }

    /// Analyse only the named columns
    pub fn with_columns<A: TriangleAccessor>(
        source: &A,
        columns: &[String],
        config: DiagnosticsConfig,
    ) -> Result<Self> {
        config.validate()?;
        let business_line = config.business_line.as_deref();

        let columns = columns
            .iter()
            .map(|name| {
                let triangle = source.get_column(name, business_line)?;
                ColumnDiagnostics::new(triangle, &config)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Analysis session with {} column(s){}",
            columns.len(),
            business_line
                .map(|b| format!(" for business line {}", b))
                .unwrap_or_default()
        );

        Ok(Self { config, columns })
    }

    /// Load a CSV source and analyse every column
    pub fn from_path<P: AsRef<Path>>(path: P, config: DiagnosticsConfig) -> Result<Self> {
        let source: TriangleSource = load_source(path)?;
        Self::new(&source, config)
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn columns(&self) -> &[ColumnDiagnostics] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDiagnostics> {
        self.columns
            .iter()
            .find(|c| c.column() == name)
            .ok_or_else(|| DiagnosticsError::ColumnNotFound {
                column: name.to_string(),
                available: self.column_names().iter().map(|s| s.to_string()).collect(),
            })
    }

    /// Swap in a reloaded triangle for the column it names
    pub fn replace_triangle(&mut self, triangle: Triangle) -> Result<()> {
        let available: Vec<String> = self.column_names().iter().map(|s| s.to_string()).collect();
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.column() == triangle.column())
            .ok_or_else(|| DiagnosticsError::ColumnNotFound {
                column: triangle.column().to_string(),
                available,
            })?;
        column.replace_triangle(triangle)
    }

    pub fn display_grid(&self, column: &str, value_type: ValueType) -> Result<ResultGrid> {
        self.column(column)?.display_grid(value_type)
    }

    pub fn reports(&self) -> Vec<ColumnReport> {
        self.columns.iter().map(ColumnDiagnostics::report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::fixtures::{calendar_shock_triangle, taylor_ashe_triangle};
    use crate::triangle::SourceRecord;

    /// Two columns with the calendar-shock pattern; `incurred` is `paid` scaled
    fn shock_source() -> TriangleSource {
        let tri = calendar_shock_triangle();
        let mut records = Vec::new();
        for i in 0..tri.n_origins() {
            for (j, dev) in tri.development().iter().enumerate() {
                if let Some(v) = tri.get(i, j) {
                    records.push(SourceRecord {
                        origin: tri.origins()[i],
                        development: dev.months(),
                        business_line: None,
                        values: vec![Some(v), Some(v * 1.5)],
                    });
                }
            }
        }
        TriangleSource::new(vec!["paid".to_string(), "incurred".to_string()], records).unwrap()
    }

    #[test]
    fn test_session_columns_in_source_order() {
        let session = AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        assert_eq!(session.column_names(), vec!["paid", "incurred"]);
        assert!(matches!(
            session.column("reported"),
            Err(DiagnosticsError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_default_critical_values() {
        let session = AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        let paid = session.column("paid").unwrap();
        let [total, by_period, development] = paid.bindings();
        assert_eq!(total.critical_value().get(), 0.10);
        assert_eq!(by_period.critical_value().get(), 0.10);
        assert_eq!(development.critical_value().get(), 0.50);
        assert_eq!(paid.valuation_total().text(), "Status: Fail");
    }

    #[test]
    fn test_critical_values_are_independent() {
        let session = AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        let paid = session.column("paid").unwrap();

        paid.valuation_total().binding().critical_value().set(0.001).unwrap();
        assert_eq!(paid.valuation_total().text(), "Status: Pass");
        assert_eq!(paid.valuation_by_period().binding().recomputations(), 0);
        assert_eq!(paid.valuation_by_period().grid().cell(3, 0), Some("Fail"));

        // Other columns are untouched
        let incurred = session.column("incurred").unwrap();
        assert_eq!(incurred.valuation_total().text(), "Status: Fail");
    }

    #[test]
    fn test_display_grid() {
        let session = AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        let values = session.display_grid("paid", ValueType::Values).unwrap();
        assert_eq!(values.row_labels[0], "2016");
        assert_eq!(values.cell(0, 0), Some("1000.00"));

        let ratios = session.display_grid("paid", ValueType::LinkRatios).unwrap();
        assert_eq!(ratios.column_count(), 4);
        assert_eq!(ratios.column_labels[0], "12-24");
        // 2.0 base ratio with a 1.2 shock on the first diagonal
        assert_eq!(ratios.cell(0, 0), Some("2.4000"));
    }

    #[test]
    fn test_reports_serialize() {
        let session = AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        let reports = session.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].tests.len(), 3);
        assert_eq!(reports[0].tests[0].status.as_deref(), Some("Status: Fail"));
        assert_eq!(reports[0].tests[1].status, None);
        assert_eq!(reports[0].tests[1].grid.row_count(), 4);

        let json = serde_json::to_string(&reports).unwrap();
        assert!(json.contains("Mack Valuation Correlation Test - Individual Years"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DiagnosticsConfig {
            development_critical: 1.2,
            ..DiagnosticsConfig::default()
        };
        assert!(matches!(
            AnalysisSession::new(&shock_source(), config),
            Err(DiagnosticsError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_missing_business_line() {
        let config = DiagnosticsConfig::default().with_business_line("Marine");
        assert!(matches!(
            AnalysisSession::new(&shock_source(), config),
            Err(DiagnosticsError::BusinessLineNotFound(_))
        ));
    }

    #[test]
    fn test_replace_triangle_rebinds_every_diagnostic() {
        let mut session =
            AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        session
            .column("paid")
            .unwrap()
            .valuation_total()
            .binding()
            .critical_value()
            .set(0.001)
            .unwrap();

        session.replace_triangle(taylor_ashe_triangle()).unwrap();

        let paid = session.column("paid").unwrap();
        assert_eq!(paid.triangle().n_origins(), 10);
        assert_eq!(paid.valuation_by_period().grid().row_count(), 9);
        let [total, by_period, development] = paid.bindings();
        for binding in [total, by_period, development] {
            assert!(Rc::ptr_eq(&binding.triangle(), paid.triangle()));
        }
        assert_eq!(total.recomputations(), 2);
        assert_eq!(by_period.recomputations(), 1);
        assert_eq!(development.recomputations(), 1);
        // Critical value carried over
        assert_eq!(total.current_result().critical_value, 0.001);
        let incurred = session.column("incurred").unwrap();
        assert_eq!(incurred.valuation_by_period().grid().row_count(), 4);
    }

    #[test]
    fn test_replace_triangle_unknown_column() {
        let mut session =
            AnalysisSession::new(&shock_source(), DiagnosticsConfig::default()).unwrap();
        let reported =
            Triangle::from_rows("reported", 2016, &[12, 24], vec![vec![1.0, 2.0], vec![1.0]])
                .unwrap();
        assert!(matches!(
            session.replace_triangle(reported.clone()),
            Err(DiagnosticsError::ColumnNotFound { .. })
        ));

        let mut paid =
            ColumnDiagnostics::new(calendar_shock_triangle(), &DiagnosticsConfig::default())
                .unwrap();
        assert!(matches!(
            paid.replace_triangle(reported),
            Err(DiagnosticsError::InvalidTriangle(_))
        ));
        assert_eq!(paid.valuation_by_period().grid().row_count(), 4);
        assert!(paid.bindings().iter().all(|b| b.recomputations() == 0));
    }
}
