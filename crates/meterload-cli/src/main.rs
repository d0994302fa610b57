//! meterload CLI
//!
//! Command-line tool for importing metering spreadsheets, aggregating them
//! hourly and exporting hourly, daily or monthly reports.

use clap::{Args, Parser, Subcommand};
use meterload_core::{
    collect_inputs, import_files, load_grid, render_rows, summarize, write_export, CellAccessor,
    Dataset, Error, ExportSpec, FieldMapping, ImportOptions, JobFile, Quantity, Resolution,
    SeriesSummary,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "meterload")]
#[command(about = "Import metering spreadsheets and export aggregated series", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Per-file load limit in seconds
    #[arg(long, global = true, env = "METERLOAD_READ_TIMEOUT", default_value_t = 30)]
    read_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Source files or directories, imported in this order
    #[arg(short, long, required = true)]
    input: Vec<PathBuf>,

    /// Mapping file (JSON)
    #[arg(short, long)]
    mapping: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file's first sheet with row/column indices, for writing a mapping
    Inspect {
        /// Path to the source file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 20)]
        rows: usize,
    },

    /// Import sources and print a summary of the series
    Import {
        #[command(flatten)]
        source: SourceArgs,

        /// Save a project snapshot here
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Product name stored in the snapshot
        #[arg(short, long, default_value = "meterload")]
        product: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export aggregated data from sources or from a saved project
    Export {
        /// Source files or directories
        #[arg(short, long, required_unless_present = "project", conflicts_with = "project")]
        input: Vec<PathBuf>,

        /// Mapping file (JSON), required with --input
        #[arg(short, long, requires = "input")]
        mapping: Option<PathBuf>,

        /// Project snapshot to export from
        #[arg(long)]
        project: Option<PathBuf>,

        /// Resolutions to export
        #[arg(short, long, value_delimiter = ',', default_value = "hourly")]
        resolution: Vec<Resolution>,

        /// Quantities to include (default: all)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<Quantity>,

        /// Separate date and time columns at hourly resolution
        #[arg(long)]
        split: bool,

        /// Product name for file names (default: the project's, else "meterload")
        #[arg(short, long)]
        product: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a job file
    Run {
        /// Path to job file (JSON)
        #[arg(short, long)]
        job: PathBuf,
    },

    /// Create a mapping file template
    CreateMapping {
        /// Output path for the mapping file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a job file template
    CreateJob {
        /// Output path for the job file
        #[arg(short, long)]
        output: PathBuf,

        /// Inputs to include
        #[arg(short, long)]
        input: Vec<PathBuf>,

        /// Output directory for exports
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,meterload={level},meterload_core={level},meterload_cli={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

async fn run(cli: Cli) -> meterload_core::Result<()> {
    let options = ImportOptions {
        read_timeout: Duration::from_secs(cli.read_timeout),
    };
    tracing::debug!(read_timeout = cli.read_timeout, "starting");

    match cli.command {
        Commands::Inspect { file, rows } => cmd_inspect(&file, rows),
        Commands::Import {
            source,
            snapshot,
            product,
            json,
        } => cmd_import(&source, snapshot.as_deref(), &product, json, &options).await,
        Commands::Export {
            input,
            mapping,
            project,
            resolution,
            columns,
            split,
            product,
            output,
        } => {
            let specs: Vec<ExportSpec> = resolution
                .into_iter()
                .map(|resolution| ExportSpec {
                    resolution,
                    split_date_time: split,
                    columns: if columns.is_empty() {
                        Quantity::ALL.to_vec()
                    } else {
                        columns.clone()
                    },
                })
                .collect();
            let (dataset, project_product) = match (project, mapping) {
                (Some(project), _) => {
                    let mut dataset = Dataset::new();
                    let metadata = dataset.load_snapshot(&project)?;
                    (dataset, Some(metadata.product))
                }
                (None, Some(mapping)) => {
                    let source = SourceArgs { input, mapping };
                    (import_dataset(&source, &options).await?.0, None)
                }
                (None, None) => {
                    return Err(Error::InvalidMapping(
                        "--mapping is required when exporting from --input".to_string(),
                    ))
                }
            };
            let product = product
                .or(project_product)
                .unwrap_or_else(|| "meterload".to_string());
            cmd_export(&dataset, &specs, &product, &output)
        }
        Commands::Run { job } => cmd_run(&job).await,
        Commands::CreateMapping { output } => cmd_create_mapping(&output),
        Commands::CreateJob {
            output,
            input,
            export_dir,
        } => cmd_create_job(&output, &input, export_dir, cli.read_timeout),
    }
}

fn cmd_inspect(file: &Path, max_rows: usize) -> meterload_core::Result<()> {
    let grid = load_grid(file)?;

    println!("File: {}", file.display());
    println!("Rows: {}", grid.row_count());
    println!("Columns: {}", grid.column_count());
    println!();

    let header: Vec<String> = (0..grid.column_count()).map(|c| format!("[{}]", c)).collect();
    println!("row\t{}", header.join("\t"));
    println!("{}", "-".repeat((header.len() + 1) * 8));

    for (index, row) in grid.rows.iter().enumerate().take(max_rows) {
        let values: Vec<String> = row.iter().map(|c| c.to_string_value()).collect();
        println!("{}\t{}", index, values.join("\t"));
    }

    if grid.row_count() > max_rows {
        println!("... ({} more rows)", grid.row_count() - max_rows);
    }

    Ok(())
}

async fn import_dataset(
    source: &SourceArgs,
    options: &ImportOptions,
) -> meterload_core::Result<(Dataset, FieldMapping, usize)> {
    let mapping = FieldMapping::load(&source.mapping)?;
    mapping.validate()?;

    let inputs = collect_inputs(&source.input)?;
    let outcome = import_files(&inputs, &mapping, options).await?;
    let skipped = outcome.skipped_rows;
    Ok((Dataset::from_merge(outcome), mapping, skipped))
}

async fn cmd_import(
    source: &SourceArgs,
    snapshot: Option<&Path>,
    product: &str,
    json: bool,
    options: &ImportOptions,
) -> meterload_core::Result<()> {
    let (dataset, mapping, skipped) = import_dataset(source, options).await?;

    if json {
        let summary = summarize(&dataset.hourly);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        if let Some(path) = snapshot {
            dataset.snapshot(product, Some(&mapping)).save(path)?;
        }
        return Ok(());
    }

    println!(
        "Imported {} readings from {} file(s)",
        dataset.readings.len(),
        dataset.sources.len()
    );
    for path in &dataset.sources {
        println!("  {}", path.display());
    }
    if skipped > 0 {
        println!("Skipped {} row(s) without a valid timestamp", skipped);
    }
    if let Some(cpe) = &dataset.cpe {
        println!("CPE: {}", cpe);
    }
    if let Some(summary) = summarize(&dataset.hourly) {
        print_summary(&summary);
    }

    if let Some(path) = snapshot {
        dataset.snapshot(product, Some(&mapping)).save(path)?;
        println!();
        println!("Saved project: {}", path.display());
    }

    Ok(())
}

fn print_summary(summary: &SeriesSummary) {
    println!();
    println!(
        "Hours: {} ({} to {})",
        summary.hours,
        summary.first_hour.format("%d/%m/%Y %H:00"),
        summary.last_hour.format("%d/%m/%Y %H:00")
    );
    if summary.oversized_hours > 0 {
        println!(
            "Warning: {} hour(s) have more readings than usual; sources may overlap",
            summary.oversized_hours
        );
    }
    println!();
    println!("{:<12}{:>16}{:>14}  peak hour", "quantity", "total", "peak");
    for q in &summary.quantities {
        println!(
            "{:<12}{:>16.2}{:>14.2}  {}",
            q.quantity.name(),
            q.total,
            q.peak,
            q.peak_hour.format("%d/%m/%Y %H:00")
        );
    }
}

fn cmd_export(
    dataset: &Dataset,
    specs: &[ExportSpec],
    product: &str,
    output: &Path,
) -> meterload_core::Result<()> {
    for spec in specs {
        let table = render_rows(&dataset.hourly, spec);
        let path = write_export(output, product, &table)?;
        println!(
            "Exported {} {} rows to {}",
            table.rows.len(),
            spec.resolution,
            path.display()
        );
    }
    Ok(())
}

async fn cmd_run(job_path: &Path) -> meterload_core::Result<()> {
    let base = job_path.parent().unwrap_or_else(|| Path::new(""));
    let job = JobFile::load(job_path)?.relative_to(base);

    println!("Running job '{}' ({} export(s))", job.product, job.exports.len());
    let report = meterload_core::run_job(&job).await?;

    println!(
        "Imported {} readings from {} file(s)",
        report.readings,
        report.sources.len()
    );
    if report.skipped_rows > 0 {
        println!("Skipped {} row(s) without a valid timestamp", report.skipped_rows);
    }
    if let Some(summary) = &report.summary {
        print_summary(summary);
    }
    println!();
    for path in &report.exports {
        println!("  - {}", path.display());
    }
    if let Some(path) = &report.snapshot {
        println!("Saved project: {}", path.display());
    }

    Ok(())
}

fn cmd_create_mapping(output: &Path) -> meterload_core::Result<()> {
    FieldMapping::template().save(output)?;
    println!("Created mapping file: {}", output.display());
    println!();
    println!("Rows and columns are zero-based. Use `meterload inspect --file <source>`");
    println!("to find the first data row and the columns, then run:");
    println!("  meterload import --input <files> --mapping {}", output.display());

    Ok(())
}

fn cmd_create_job(
    output: &Path,
    inputs: &[PathBuf],
    export_dir: Option<PathBuf>,
    read_timeout: u64,
) -> meterload_core::Result<()> {
    let mut job = JobFile::template();
    if !inputs.is_empty() {
        job.inputs = inputs.to_vec();
    }
    if let Some(dir) = export_dir {
        job.snapshot = Some(dir.join("project.json"));
        job.output_dir = dir;
    }
    job.read_timeout_secs = read_timeout;

    job.save(output)?;
    println!("Created job file: {}", output.display());
    println!();
    println!("Edit the mapping and exports, then run:");
    println!("  meterload run --job {}", output.display());

    Ok(())
}
