//! Trip Loader CLI.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use trip_loader::export::export_parquet;
use trip_loader::fetcher::formats::FileFormat;
use trip_loader::fetcher::uploads::Upload;
use trip_loader::period::PeriodMetadata;
use trip_loader::sample::{DEFAULT_SAMPLE_ROWS, DEFAULT_SAMPLE_SEED};
use trip_loader::session::{DataSource, Session, SessionDataset};
use trip_loader::settings::LoaderSettings;
use trip_loader::statistics::{
    categorical_columns, describe_numeric, trips_per_hour, value_counts, DEFAULT_TOP_VALUES,
};
use trip_loader::TripLoaderResult;

#[derive(Parser)]
#[command(
    name = "trip-loader",
    version,
    about = "Load, clean, and summarize NYC taxi trip data",
    long_about = "Load NYC taxi trip data from a shared link or local files, clean it,\n\
                  and print a normalization report and summary insights.\n\n\
                  Set DEBUG_TRIP_LOADER=true for progress logs."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a shared file and load it.
    Fetch(FetchArgs),

    /// Combine local CSV and Parquet files as if they were uploaded.
    Upload(UploadArgs),

    /// Generate a synthetic trip table and load it.
    Sample(SampleArgs),
}

#[derive(Parser)]
struct ReportArgs {
    /// Also print trips per hour, numeric column profiles, and top values.
    #[arg(long = "describe")]
    describe: bool,

    /// Write the cleaned table to this Parquet file.
    #[arg(long = "export", value_name = "FILE")]
    export: Option<PathBuf>,
}

#[derive(Parser)]
struct FetchArgs {
    /// Sharing link of the file.
    #[arg(value_name = "LINK")]
    link: String,

    /// Format of the shared file; selects the parser.
    #[arg(long = "format", value_enum, default_value = "csv")]
    format: FormatArg,

    /// Directory the download is written to.
    #[arg(long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Parser)]
struct UploadArgs {
    /// Files to combine, in order.
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Period the files cover: auto, YYYY-MM, YYYY-MM..YYYY-MM, or YYYY-MM-DD..YYYY-MM-DD.
    #[arg(
        long = "period",
        value_name = "PERIOD",
        default_value = "auto",
        value_parser = parse_period
    )]
    period: PeriodMetadata,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Parser)]
struct SampleArgs {
    /// Number of trips to generate.
    #[arg(long = "rows", default_value_t = DEFAULT_SAMPLE_ROWS)]
    rows: usize,

    /// Seed of the generator; the same seed gives the same table.
    #[arg(long = "seed", default_value_t = DEFAULT_SAMPLE_SEED)]
    seed: u64,

    #[command(flatten)]
    report: ReportArgs,
}

fn parse_period(text: &str) -> Result<PeriodMetadata, String> {
    text.parse().map_err(|e: trip_loader::TripLoaderError| e.to_string())
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Parquet,
    Xlsx,
}

impl From<FormatArg> for FileFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => FileFormat::Csv,
            FormatArg::Parquet => FileFormat::Parquet,
            FormatArg::Xlsx => FileFormat::Excel,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Fetch(args) => run_fetch(args).await,
        Command::Upload(args) => run_upload(args).await,
        Command::Sample(args) => run_sample(args).await,
    };
    std::process::exit(exit_code);
}

async fn run_fetch(args: FetchArgs) -> i32 {
    let mut settings = LoaderSettings::from_env().with_format(args.format.into());
    if let Some(dir) = args.output_dir {
        settings = settings.with_output_dir(dir);
    }
    let mut session = Session::new(settings);
    if let Err(failure) = session.load_link(&args.link).await {
        eprintln!("error: {failure}");
        return 1;
    }
    report(&session, &args.report).await
}

async fn run_upload(args: UploadArgs) -> i32 {
    let mut uploads = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                uploads.push(Upload::new(name, bytes));
            }
            Err(error) => eprintln!("warning: skipping {}: {error}", path.display()),
        }
    }

    let mut session = Session::new(LoaderSettings::from_env());
    if let Err(failure) = session.load_uploads(&uploads, args.period).await {
        eprintln!("error: {failure}");
        return 1;
    }
    report(&session, &args.report).await
}

async fn run_sample(args: SampleArgs) -> i32 {
    let mut session = Session::new(LoaderSettings::from_env());
    if let Err(failure) = session.load_sample(args.rows, args.seed).await {
        eprintln!("error: {failure}");
        return 1;
    }
    report(&session, &args.report).await
}

async fn report(session: &Session, args: &ReportArgs) -> i32 {
    let Some(data) = session.dataset() else {
        return 1;
    };
    let mut result = print_report(session, data, args.export.as_deref()).await;
    if result.is_ok() && args.describe {
        result = print_description(data).await;
    }
    match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error}");
            1
        }
    }
}

async fn print_report(
    session: &Session,
    data: &SessionDataset,
    export: Option<&Path>,
) -> TripLoaderResult<()> {
    match &data.source {
        DataSource::Link(link) => println!("Source: {link}"),
        DataSource::Uploads { accepted, skipped } => {
            for file in accepted {
                println!("Loaded {} ({} rows)", file.name, file.rows);
            }
            for file in skipped {
                println!("Skipped {}: {}", file.name, file.reason);
            }
        }
        DataSource::Sample { rows, seed } => println!("Source: {rows} sample trips (seed {seed})"),
    }

    let report = &data.dataset.report;
    println!(
        "Rows: {} ({} duplicates removed)",
        report.rows_after,
        report.duplicates_removed()
    );
    for coercion in &report.coercions {
        println!(
            "  {:<28} {:<9} {} nulls introduced",
            coercion.column,
            coercion.kind.to_string(),
            coercion.nulls_introduced()
        );
    }
    for suggestion in &report.unapplied_suggestions {
        println!(
            "  {:<28} looks like a datetime but is {:?}; left unchanged",
            suggestion.column, suggestion.found
        );
    }
    for rejected in &report.rejected_mappings {
        println!(
            "  {:<28} mapped to {} but is {:?}; left unchanged",
            rejected.column, rejected.requested, rejected.found
        );
    }
    if let Some(period) = data.period_label() {
        println!("Period: {period}");
    }

    if let Some(summary) = session.summary().await? {
        println!("Total trips: {}", summary.total_trips);
        for insight in summary.insights() {
            println!("- {insight}");
        }
    }

    if let Some(path) = export {
        let rows = export_parquet(data.frame().clone(), path).await?;
        println!("Exported {} rows to {}", rows, path.display());
    }
    Ok(())
}

async fn print_description(data: &SessionDataset) -> TripLoaderResult<()> {
    let frame = data.frame();
    if let Some(period) = &data.period {
        println!("Trips per hour ({}):", period.column);
        for (hour, trips) in trips_per_hour(frame, &period.column).await? {
            println!("  {hour:02}:00  {trips}");
        }
    }

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    println!(
        "{:<24} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "column", "count", "mean", "std", "min", "median", "max"
    );
    for profile in describe_numeric(frame).await? {
        println!(
            "{:<24} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
            profile.column,
            profile.count,
            fmt(profile.mean),
            fmt(profile.std),
            fmt(profile.min),
            fmt(profile.median),
            fmt(profile.max)
        );
    }

    for column in categorical_columns(frame) {
        println!("Top values of {column}:");
        for (value, count) in value_counts(frame, &column, DEFAULT_TOP_VALUES).await? {
            println!("  {value:<30} {count}");
        }
    }
    Ok(())
}
