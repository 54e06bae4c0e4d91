//! Sweep critical values for every column of a triangle source
//!
//! Evaluates both aggregate tests over a grid of critical values and writes
//! one CSV row per (column, test, critical value)

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use triangle_diagnostics::diagnostics::{AggregateOutcome, Outcome, Statistic, TestRequest};
use triangle_diagnostics::{
    load_source, CorrelationTestResult, Triangle, TriangleAccessor, Verdict,
};

const DEFAULT_GRID: &[f64] = &[0.001, 0.01, 0.05, 0.10, 0.20, 0.30, 0.40, 0.50];

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Evaluate Mack's correlation tests over a grid of critical values")]
struct Cli {
    /// Long-format triangle CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Restrict to one business line (default: sum across lines)
    #[arg(short, long)]
    business_line: Option<String>,

    /// Critical values to evaluate, comma separated
    #[arg(long, value_delimiter = ',')]
    critical: Vec<f64>,

    /// Output CSV path
    #[arg(short, long, default_value = "critical_value_sweep.csv")]
    output: PathBuf,
}

/// One row of the sweep output
#[derive(Debug, Clone, Serialize)]
struct SweepRow {
    column: String,
    test: &'static str,
    critical_value: f64,
    status: &'static str,
    statistic: Option<f64>,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
}

impl SweepRow {
    fn new(column: &str, request: TestRequest, result: &CorrelationTestResult) -> Self {
        let (statistic, range) = match &result.outcome {
            Outcome::Aggregate(AggregateOutcome {
                statistic: Some(Statistic::Valuation(s)),
                ..
            }) => (Some(s.z), Some(s.range)),
            Outcome::Aggregate(AggregateOutcome {
                statistic: Some(Statistic::Development(s)),
                ..
            }) => (Some(s.t), Some(s.range)),
            _ => (None, None),
        };
        let status = result
            .aggregate_verdict()
            .map(Verdict::label)
            .unwrap_or_default();

        Self {
            column: column.to_string(),
            test: request.title(),
            critical_value: result.critical_value,
            status,
            statistic,
            lower_bound: range.map(|r| r.lower),
            upper_bound: range.map(|r| r.upper),
        }
    }
}

fn sweep(triangle: &Triangle, grid: &[f64]) -> Result<Vec<SweepRow>> {
    let mut rows = Vec::with_capacity(grid.len() * 2);
    for request in [TestRequest::ValuationTotal, TestRequest::Development] {
        for &p in grid {
            let result = request
                .run(triangle, p)
                .with_context(|| format!("{} at {}", triangle.column(), p))?;
            rows.push(SweepRow::new(triangle.column(), request, &result));
        }
    }
    Ok(rows)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let grid: Vec<f64> = if cli.critical.is_empty() {
        DEFAULT_GRID.to_vec()
    } else {
        cli.critical.clone()
    };

    let start = Instant::now();
    println!("Loading triangles from {}...", cli.input.display());
    let source = load_source(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;

    let triangles: Vec<Triangle> = source
        .column_names()
        .iter()
        .map(|c| source.get_column(c, cli.business_line.as_deref()))
        .collect::<triangle_diagnostics::Result<_>>()?;
    println!("Loaded {} column(s) in {:?}", triangles.len(), start.elapsed());

    // Columns are independent; evaluate them in parallel
    let results: Vec<Vec<SweepRow>> = triangles
        .par_iter()
        .map(|triangle| sweep(triangle, &grid))
        .collect::<Result<_>>()?;

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    for row in results.iter().flatten() {
        writer.serialize(row)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} rows to {} in {:?}",
        results.iter().map(Vec::len).sum::<usize>(),
        cli.output.display(),
        start.elapsed()
    );
    Ok(())
}
