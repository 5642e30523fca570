use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use edgar_insiders::app::{App, IngestOptions, ProgressSink, RunSummary};
use edgar_insiders::config::{ConfigLoader, IN_MEMORY_DATABASE, ResolvedConfig};
use edgar_insiders::domain::{DatasetName, DatasetSelection, Quarter, ReportFormat, parse_iso_date};
use edgar_insiders::error::InsiderError;
use edgar_insiders::fetch::{EdgarHttpClient, Identity};
use edgar_insiders::output::{JsonOutput, OutputMode, TracingSink, print_summary_text};
use edgar_insiders::report::{dump, open_output, write_table};
use edgar_insiders::store::Store;

#[derive(Parser)]
#[command(name = "edgar-insiders")]
#[command(about = "Collect large insider trades from SEC EDGAR Form 3/4/5 datasets")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Config file (default: ./edgar-insiders.json if present)")]
    config: Option<String>,

    #[arg(long, global = true, help = "SQLite database file (default: in memory)")]
    database: Option<String>,

    #[arg(long, global = true, help = "Contact string sent as User-Agent (overrides EQEMAIL)")]
    contact: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download a quarterly dataset archive")]
    Fetch(DatasetArgs),
    #[command(about = "Print the name of the newest dataset on the listing page")]
    Latest,
    #[command(about = "Load a dataset into the database")]
    Ingest(IngestArgs),
    #[command(about = "Write stored transactions as CSV")]
    Report(ReportArgs),
    #[command(about = "Ingest a dataset, then report (needed with the in-memory database)")]
    Run(RunArgs),
}

#[derive(Args, Clone)]
struct DatasetArgs {
    #[arg(long, requires = "quarter")]
    year: Option<i32>,

    #[arg(long, requires = "year", value_parser = clap::value_parser!(u8).range(1..=4))]
    quarter: Option<u8>,

    #[arg(long, conflicts_with_all = ["year", "quarter"])]
    latest: bool,

    #[arg(long, help = "Where downloaded archives are kept")]
    directory: Option<Utf8PathBuf>,

    #[arg(long, help = "Download again even if the archive is already present")]
    force: bool,
}

#[derive(Args, Clone)]
struct IngestArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long, conflicts_with_all = ["year", "quarter", "latest"])]
    archive: Option<Utf8PathBuf>,

    #[arg(long, help = "Keep only the N largest trades by dollar value")]
    top: Option<usize>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Args, Clone)]
struct ReportArgs {
    #[arg(long, value_parser = parse_date, help = "First TRANS_DATE to report (YYYY-MM-DD)")]
    start: Option<NaiveDate>,

    #[arg(long, value_parser = parse_date, requires = "start", conflicts_with = "days")]
    end: Option<NaiveDate>,

    #[arg(long, requires = "start", help = "Window length in days after --start (default 7)")]
    days: Option<u32>,

    #[arg(short, long, help = "Report file (default: stdout)")]
    output: Option<Utf8PathBuf>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
    format: ReportFormat,

    #[arg(long)]
    table: Option<String>,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    ingest: IngestArgs,

    #[command(flatten)]
    report: ReportArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<InsiderError>() {
            return ExitCode::from(err.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(contact) = cli.contact {
        config.contact = Some(contact);
    }

    match cli.command {
        Commands::Fetch(args) => {
            let selection = dataset_selection(&args, None);
            let app = build_app(with_directory(config, &args))?;
            let path = app.acquire(&selection, args.force, &TracingSink)?;
            println!("{path}");
            Ok(())
        }
        Commands::Latest => {
            let app = build_app(config)?;
            println!("{}", app.resolve_latest(&TracingSink)?);
            Ok(())
        }
        Commands::Ingest(args) => {
            if config.database == IN_MEMORY_DATABASE {
                warn!("database is in memory; ingested rows are discarded at exit (use --database or `run`)");
            }
            let mut store = Store::open_with_table(&config.database, &config.table)?;
            run_ingest(&args, config, &mut store)?;
            Ok(())
        }
        Commands::Report(args) => {
            let store = Store::open_with_table(&config.database, &config.table)?;
            run_report(&args, &store)
        }
        Commands::Run(args) => {
            let mut store = Store::open_with_table(&config.database, &config.table)?;
            run_ingest(&args.ingest, config, &mut store)?;
            run_report(&args.report, &store)
        }
    }
}

fn run_ingest(
    args: &IngestArgs,
    config: ResolvedConfig,
    store: &mut Store,
) -> miette::Result<RunSummary> {
    let selection = dataset_selection(&args.dataset, args.archive.clone());
    let app = build_app(with_directory(config, &args.dataset))?;
    let options = IngestOptions {
        force_download: args.dataset.force,
        top: args.top,
    };
    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let sink: &dyn ProgressSink = match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TracingSink,
    };

    let summary = app.ingest(store, &selection, &options, sink)?;
    match mode {
        OutputMode::Json => JsonOutput::print_summary(&summary)
            .map_err(|err| InsiderError::Report(err.to_string()))?,
        OutputMode::Text => print_summary_text(&summary),
    }
    Ok(summary)
}

fn run_report(args: &ReportArgs, store: &Store) -> miette::Result<()> {
    let table = args.table.as_deref().unwrap_or(store.table());
    let writer = open_output(args.output.as_deref())?;
    match (args.start, args.end) {
        (Some(start), Some(end)) => {
            let rows = store.select_by_date_range(table, start, end)?;
            write_table(&rows, table, writer, args.format)?;
        }
        (Some(start), None) => {
            let rows = store.select_by_date_window(table, start, args.days.unwrap_or(7))?;
            write_table(&rows, table, writer, args.format)?;
        }
        _ => {
            dump(store, table, writer, args.format)?;
        }
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_iso_date(value).map_err(|err| err.to_string())
}

fn build_app(config: ResolvedConfig) -> miette::Result<App<EdgarHttpClient>> {
    let identity = Identity::from_contact(config.contact.as_deref());
    let client = EdgarHttpClient::new(&identity, config.retry)?;
    Ok(App::new(client, config))
}

fn with_directory(mut config: ResolvedConfig, args: &DatasetArgs) -> ResolvedConfig {
    if let Some(directory) = &args.directory {
        config.download_dir = directory.clone();
    }
    config
}

/// Explicit archive, then `--latest`, then `--year/--quarter`; with none of
/// them, the last completed quarter.
fn dataset_selection(args: &DatasetArgs, archive: Option<Utf8PathBuf>) -> DatasetSelection {
    if let Some(path) = archive {
        return DatasetSelection::LocalArchive(path);
    }
    if args.latest {
        return DatasetSelection::Latest;
    }
    match (args.year, args.quarter.and_then(|q| Quarter::new(q).ok())) {
        (Some(year), Some(quarter)) => DatasetSelection::Named(DatasetName::new(year, quarter)),
        _ => DatasetSelection::Named(DatasetName::latest_completed(Local::now().date_naive())),
    }
}
