//! Triangle Diagnostics CLI
//!
//! Runs Mack's correlation tests for every measurement column of a CSV triangle source

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use triangle_diagnostics::{
    AnalysisSession, ColumnDiagnostics, DiagnosticsConfig, TriangleSource, ValueType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "mack-diagnostics")]
#[command(about = "Mack's valuation and development correlation tests for loss triangles")]
#[command(version)]
struct Cli {
    /// Long-format triangle CSV (origin, development[, business_line], columns...)
    #[arg(short, long)]
    input: PathBuf,

    /// Measurement column to analyse; repeat for several. Defaults to all columns.
    #[arg(short, long)]
    column: Vec<String>,

    /// Restrict to one business line (default: sum across lines)
    #[arg(short, long)]
    business_line: Option<String>,

    /// JSON configuration file; command-line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Critical value for the valuation correlation test
    #[arg(long)]
    valuation_critical: Option<f64>,

    /// Critical value for the development correlation test
    #[arg(long)]
    development_critical: Option<f64>,

    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also print the triangle of each column
    #[arg(long)]
    show_triangle: bool,

    /// Quantity shown by --show-triangle: "values" or "link-ratios"
    #[arg(long, default_value = "values")]
    value_type: ValueType,
}

impl Cli {
    fn diagnostics_config(&self) -> Result<DiagnosticsConfig> {
        let mut config = match &self.config {
            Some(path) => DiagnosticsConfig::from_json_path(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => DiagnosticsConfig::default(),
        };
        if let Some(p) = self.valuation_critical {
            config.valuation_critical = p;
        }
        if let Some(p) = self.development_critical {
            config.development_critical = p;
        }
        if let Some(line) = &self.business_line {
            config.business_line = Some(line.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.diagnostics_config()?;

    let source: TriangleSource = triangle_diagnostics::load_source(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    let columns = if cli.column.is_empty() {
        source.columns().to_vec()
    } else {
        cli.column.clone()
    };
    let session = AnalysisSession::with_columns(&source, &columns, config)?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session.reports())?);
        }
        OutputFormat::Text => {
            println!("Triangle Diagnostics v{}", env!("CARGO_PKG_VERSION"));
            println!("===========================\n");
            println!("Source: {}", cli.input.display());
            if let Some(line) = &session.config().business_line {
                println!("Business line: {}", line);
            }
            println!();
            for column in session.columns() {
                print_column(column, &cli)?;
            }
        }
    }

    Ok(())
}

fn print_column(column: &ColumnDiagnostics, cli: &Cli) -> Result<()> {
    let triangle = column.triangle();
    println!("Column: {}", column.column());
    println!(
        "  {} origin periods x {} development periods, {} observed cells",
        triangle.n_origins(),
        triangle.n_development(),
        triangle.cell_count()
    );
    println!("{}", "-".repeat(60));

    if cli.show_triangle {
        let grid = column.display_grid(cli.value_type)?;
        println!("{}:", cli.value_type);
        print!("{}", grid.render());
        println!();
    }

    for label in [column.valuation_total(), column.development()] {
        let binding = label.binding();
        println!(
            "{} (critical value {}): {}",
            binding.request().title(),
            binding.critical_value().get(),
            label
        );
        if let Some(reason) = label
            .verdict()
            .and_then(|v| v.conclusive().err())
        {
            println!("  {}", reason);
        }
    }

    let by_period = column.valuation_by_period();
    println!(
        "\n{} (critical value {}):",
        by_period.binding().request().title(),
        by_period.binding().critical_value().get()
    );
    print!("{}", by_period.grid().render());
    println!();

    Ok(())
}
