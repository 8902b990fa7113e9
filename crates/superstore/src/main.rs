use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use superstore_core::{
    config::EtlConfig, load::preflight_csv, pipeline, verify::RunSummary, wait, RunOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk-load the Superstore CSV into a star schema", long_about = None)]
struct Cli {
    /// Emit logs as JSON instead of plain text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recreate the database, load the CSV and build the schema
    Run(RunArgs),
    /// Block until the database server accepts connections
    Wait(WaitArgs),
    /// Check the CSV layout without touching the database
    CheckCsv(CsvArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    csv: CsvArgs,
    #[command(flatten)]
    wait: WaitArgs,
    /// Skip waiting for the server to become reachable
    #[arg(long)]
    skip_wait: bool,
    /// Print the run summary as JSON
    #[arg(long)]
    json_summary: bool,
}

#[derive(Args, Debug, Default)]
struct CsvArgs {
    /// CSV file to load (overrides CSV_PATH)
    #[arg(long = "csv")]
    path: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct WaitArgs {
    /// Give up after this many failed probes (overrides DB_WAIT_MAX_ATTEMPTS)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_wait_attempts: Option<u32>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::Wait(args) => handle_wait(args).await,
        Command::CheckCsv(args) => handle_check_csv(args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn load_config(csv: &CsvArgs, wait: &WaitArgs) -> Result<EtlConfig> {
    let mut config = EtlConfig::from_env().context("invalid configuration")?;
    if let Some(path) = &csv.path {
        config.csv_path = path.clone();
    }
    if let Some(max) = wait.max_wait_attempts {
        config.wait.max_attempts = Some(max);
    }
    Ok(config)
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.csv, &args.wait)?;
    info!(
        host = %config.host,
        database = %config.target_database,
        csv = %config.csv_path.display(),
        "Starting load"
    );

    let summary = pipeline::run(
        config,
        RunOptions {
            skip_wait: args.skip_wait,
        },
    )
    .await
    .context("superstore load failed")?;

    if args.json_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn handle_wait(args: WaitArgs) -> Result<()> {
    let config = load_config(&CsvArgs::default(), &args)?;
    let attempts = wait::wait_for_database(&config)
        .await
        .context("database never became reachable")?;
    println!("Database ready after {attempts} attempt(s).");
    Ok(())
}

fn handle_check_csv(args: CsvArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => std::env::var_os(superstore_core::config::CSV_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(superstore_core::config::DEFAULT_CSV_PATH)),
    };
    let preflight =
        preflight_csv(&path).with_context(|| format!("{} is not loadable", path.display()))?;
    println!(
        "{}: {} data rows, layout OK.",
        preflight.path.display(),
        preflight.data_rows
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Table", "Rows"]);
    table.add_row(vec!["orders (fact)".to_string(), summary.fact_rows.to_string()]);
    for dim in &summary.dimensions {
        table.add_row(vec![dim.table.to_string(), dim.rows.to_string()]);
    }

    println!("Database {} rebuilt.", summary.database);
    println!(
        "CSV rows: {}, staged rows: {}",
        summary.csv_rows, summary.staged_rows
    );
    println!("{table}");
}
