use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tallygrid::config::{AnalyticsConfig, QueryConfig, PRESETS};
use tallygrid::engine::{AggregationDriver, Delivery, FailurePolicy, Granularity, Report};
use tallygrid::source::STDIN_PATH;
use tallygrid::EngineError;
use tracing::{debug, error, trace};

/// Count matching forum posts across a pool of workers
#[derive(Parser)]
#[command(name = "tallygrid")]
#[command(about = "Batch-distribute-reduce counting of tagged forum posts", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over a post dump
    Run(RunArgs),
    /// List the built-in query presets
    Presets,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Post dump to read, `-` for stdin (overrides the config file)
    input: Option<PathBuf>,

    /// Path to a TOML or YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Query preset to run (see `tallygrid presets`)
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Maximum records per batch
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Number of local workers
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Concurrent units per worker
    #[arg(long)]
    slots_per_worker: Option<usize>,

    #[arg(long, value_enum)]
    granularity: Option<Granularity>,

    #[arg(long, value_enum)]
    delivery: Option<Delivery>,

    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    /// Per-round deadline, e.g. `30s` or `2m`
    #[arg(long, value_parser = parse_duration)]
    round_timeout: Option<Duration>,

    /// Merge each round's partials before reducing them
    #[arg(long)]
    pre_combine: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("tallygrid started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run(args) => run_query(args).await,
        Commands::Presets => {
            list_presets();
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<EngineError>() {
            Some(engine_error) => {
                eprintln!("Error: {}", engine_error.summary());
                std::process::exit(engine_error.exit_code());
            }
            None => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_query(args: RunArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => AnalyticsConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let query = config.query.compile()?;
    let plan = query.plan.clone();
    let input = config
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(STDIN_PATH));

    let mut driver = AggregationDriver::from_config(query.plan, &config.engine)?
        .with_subject(query.subject.clone());

    match driver.run(&input).await {
        Ok(report) => print_report(&report, args.json),
        Err(e) => {
            if let Some(partial) = e.partial() {
                let report = Report::new(&plan, query.subject, partial.clone(), 0);
                eprintln!(
                    "Partial result after {} completed rounds (not final):",
                    partial.rounds
                );
                print_report(&report, args.json)?;
            }
            Err(e.into())
        }
    }
}

fn apply_overrides(config: &mut AnalyticsConfig, args: &RunArgs) {
    if let Some(input) = &args.input {
        config.input = Some(input.clone());
    }
    if let Some(name) = &args.query {
        config.query = QueryConfig::preset(name.clone());
    }

    let engine = &mut config.engine;
    if let Some(batch_size) = args.batch_size {
        engine.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        engine.workers = workers;
    }
    if let Some(slots) = args.slots_per_worker {
        engine.slots_per_worker = slots;
    }
    if let Some(granularity) = args.granularity {
        engine.granularity = granularity;
    }
    if let Some(delivery) = args.delivery {
        engine.delivery = delivery;
    }
    if let Some(policy) = args.failure_policy {
        engine.failure_policy = policy;
    }
    if args.round_timeout.is_some() {
        engine.round_timeout = args.round_timeout;
    }
    if args.pre_combine {
        engine.pre_combine = true;
    }
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn list_presets() {
    for preset in PRESETS {
        println!("{:<22} {}", preset.name, preset.description);
    }
}
