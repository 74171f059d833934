//! Creator CLI - Generate and mutate upload spreadsheets
//!
//! # Main Commands
//!
//! ```bash
//! creator run                                  # Run config/create/creator_config.csv
//! creator run create/other_config.csv -k       # Run another job table, keep going on failures
//! creator job --kind relation --source create/ad_relation.csv --destination create/ad_upload.csv
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! creator inspect config/create/ad_upload.csv  # Print a table as JSON records
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use creator::models::RowFilter;
use creator::parser::ReadOptions;
use creator::{
    CsvStore, FieldSpec, Job, JobConfig, JobKind, JobRunner, Paths, RunReport, Table, TabularStore,
    DEFAULT_JOB_TABLE,
};
use serde_json::{Map, Value};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "creator")]
#[command(about = "Generate upload spreadsheets from job tables and relation rules", long_about = None)]
struct Cli {
    /// Directory holding job tables and upload files
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Directory for undefined-value reports
    #[arg(long, global = true)]
    error_dir: Option<PathBuf>,

    /// Directory listing creative files for match tables
    #[arg(long, global = true)]
    creative_dir: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job of a job table
    Run {
        /// Job table, relative to the config directory
        #[arg(default_value = DEFAULT_JOB_TABLE)]
        job_table: PathBuf,

        /// Record failing jobs and continue with the next one
        #[arg(short, long)]
        keep_going: bool,

        /// Write the run report as JSON
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Run a single job given on the command line
    Job {
        /// Job type (create, duplicate, relation, mediaplan, match)
        #[arg(long)]
        kind: String,

        /// Source file, relative to the config directory
        #[arg(long)]
        source: String,

        /// Destination file (for match tables: creator|filter[::idx]|relation)
        #[arg(long)]
        destination: String,

        /// Job-specific column spec
        #[arg(long)]
        spec: Option<String>,

        /// Replace the destination instead of appending (create jobs)
        #[arg(long)]
        overwrite: bool,

        /// Source row filter, 'column::value1|value2'
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print a table as JSON records
    Inspect {
        /// Input file
        input: PathBuf,

        /// Number of records above the header
        #[arg(long, default_value = "0")]
        header_row: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.log_level, cli.log_file.as_deref()) {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }

    let paths = build_paths(&cli);

    let result = match cli.command {
        Commands::Run {
            job_table,
            keep_going,
            summary,
        } => cmd_run(&paths, &job_table, keep_going, summary.as_deref()),

        Commands::Job {
            kind,
            source,
            destination,
            spec,
            overwrite,
            filter,
        } => cmd_job(&paths, &kind, source, destination, spec.as_deref(), overwrite, filter.as_deref()),

        Commands::Inspect {
            input,
            header_row,
            output,
        } => cmd_inspect(&input, header_row, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false).without_time();
    let file = match log_file {
        Some(path) => {
            let file = fs::File::create(path)?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry().with(filter).with(console).with(file).init();
    Ok(())
}

/// Defaults, then `CREATOR_*` environment variables, then flags.
fn build_paths(cli: &Cli) -> Paths {
    let mut paths = Paths::from_env();
    if let Some(dir) = &cli.config_dir {
        paths.config_dir = dir.clone();
    }
    if let Some(dir) = &cli.error_dir {
        paths.error_dir = dir.clone();
    }
    if let Some(dir) = &cli.creative_dir {
        paths.creative_dir = dir.clone();
    }
    paths
}

fn cmd_run(
    paths: &Paths,
    job_table: &Path,
    keep_going: bool,
    summary: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = CsvStore::new();
    let config = JobConfig::load(&store, paths, job_table)?;
    eprintln!("📋 {} job(s), {} rejected row(s)", config.len(), config.rejected.len());

    let report = JobRunner::new(&store, paths).keep_going(keep_going).run_all(&config)?;
    print_report(&report);

    if let Some(path) = summary {
        write_summary(&report, path)?;
    }
    Ok(())
}

fn cmd_job(
    paths: &Paths,
    kind: &str,
    source: String,
    destination: String,
    spec: Option<&str>,
    overwrite: bool,
    filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = JobKind::parse(kind);
    let job = Job {
        spec: FieldSpec::parse(&kind, spec, &destination)?,
        row_filter: filter.map(RowFilter::parse).transpose()?,
        source_file: source,
        destination_file: destination,
        kind,
        overwrite,
    };

    let store = CsvStore::new();
    let report = JobRunner::new(&store, paths).run_all(&JobConfig::single(job))?;
    print_report(&report);
    Ok(())
}

fn cmd_inspect(input: &Path, header_row: usize, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());

    let table = CsvStore::new().read_with(input, &ReadOptions::with_header_row(header_row))?;
    eprintln!("   Columns: {}", table.columns().join(", "));
    eprintln!("✓ Read {} records", table.len());

    let json = serde_json::to_string_pretty(&to_records(&table))?;
    write_output(&json, output)?;
    Ok(())
}

/// One JSON object per row; absent cells become `null`.
fn to_records(table: &Table) -> Vec<Value> {
    table
        .rows()
        .iter()
        .map(|row| {
            let record: Map<String, Value> = table
                .columns()
                .iter()
                .zip(row)
                .map(|(name, cell)| {
                    let value = cell.as_ref().map_or(Value::Null, |v| Value::String(v.clone()));
                    (name.clone(), value)
                })
                .collect();
            Value::Object(record)
        })
        .collect()
}

fn print_report(report: &RunReport) {
    eprintln!("\n📊 {} job(s) run", report.jobs_run);
    for (destination, counts) in &report.counts {
        for (column, count) in counts.iter().filter(|(_, c)| **c > 0) {
            eprintln!("   ⚠ {}: {} undefined value(s) in '{}'", destination, count, column);
        }
    }
    for failure in &report.failures {
        eprintln!("   ✗ row {}: {}", failure.row, failure.error);
    }
    if report.is_clean() {
        eprintln!("✓ All values resolved");
    }
}

fn write_summary(report: &RunReport, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    eprintln!("💾 Summary written to: {}", path.display());
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
