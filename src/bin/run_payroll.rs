use std::{fs::OpenOptions, io, process::ExitCode, sync::Arc};

use chrono::{Datelike as _, Local, NaiveDate};
use clap::Parser;
use sea_orm::{Database, DbErr};
use serde_json::json;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{filter, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use progress_payroll::{
    config,
    payroll::{store::SeaOrmStore, PayrollEngine, PayrollError, RunMode, RunRequest, RunSummary, Trigger},
    utils,
};

/// Computes the monthly payroll of every active staff member
#[derive(Debug, Parser)]
#[command(name = "run_payroll")]
struct Args {
    /// Month to process (1-12), last month when omitted
    month: Option<u32>,
    /// Year to process, the current year when only the month is given
    year: Option<i32>,
    /// Replace the results of an already processed month
    #[arg(long)]
    force: bool,
    /// Compute and print without persisting anything
    #[arg(long)]
    preview: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("unable to connect to database: {0}")]
    Connect(DbErr),

    #[error(transparent)]
    Payroll(#[from] PayrollError),
}

fn resolve_period(month: Option<u32>, year: Option<i32>, today: NaiveDate) -> (u32, i32) {
    match month {
        Some(month) => (month, year.unwrap_or(today.year())),
        None => utils::previous_month(today),
    }
}

/// A run that skipped some staff still commits, but is reported as failed
fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing() {
    // Stdout carries the JSON summary, logs go to stderr
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let trace_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("trace.log")
        .ok()
        .map(|log_file|
            fmt::layer()
                .with_ansi(false)
                .with_writer(log_file)
                .with_filter(filter::LevelFilter::from_level(Level::TRACE))
        );

    let subscriber = Registry::default()
        .with(console)
        .with(trace_file);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("unable to install tracing subscriber: {err}");
    }
}

async fn run(args: &Args) -> Result<RunSummary, CliError> {
    let (month, year) = resolve_period(args.month, args.year, Local::now().date_naive());

    let database_opt = config::load_cli()?;
    let db = Database::connect(database_opt).await.map_err(CliError::Connect)?;

    let engine = PayrollEngine::new(SeaOrmStore::new(Arc::new(db)));
    let summary = engine.run(&RunRequest {
        month,
        year,
        mode: if args.preview { RunMode::Preview } else { RunMode::Run },
        force: args.force,
        trigger: Trigger::Cli,
        actor: None,
    }).await?;

    Ok(summary)
}

#[actix_web::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        },
        Err(err) => {
            println!("{}", json!({ "error": err.to_string().trim() }));
            return ExitCode::FAILURE;
        },
    };

    init_tracing();

    match run(&args).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(output) => {
                println!("{output}");
                exit_code(&summary)
            },
            Err(err) => {
                println!("{}", json!({ "error": err.to_string() }));
                ExitCode::FAILURE
            },
        },
        Err(err) => {
            println!("{}", json!({ "error": err.to_string() }));
            ExitCode::FAILURE
        },
    }
}
