//! skein - バンドル済みシナリオを skein-core 上で実行する CLI

mod registry;
mod runner;
mod scenarios;
mod transcript;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use skein_core::{ConfigError, RuntimeFlavor, SchedulerConfig};

use crate::registry::RegistryError;
use crate::runner::run_scenario;

#[derive(Parser)]
#[command(name = "skein", about = "Run concurrency scenarios on the skein runtime core")]
struct Cli {
    /// JSON scheduler config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    flavor: Option<FlavorArg>,

    /// Worker threads for the multi_thread flavor
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List scenario names
    List,
    /// Run one scenario and print its report as JSON
    Run { scenario: String },
    /// Run every scenario, one JSON line each
    RunAll,
}

#[derive(Clone, Copy, ValueEnum)]
enum FlavorArg {
    #[value(name = "multi_thread")]
    MultiThread,
    #[value(name = "current_thread")]
    CurrentThread,
}

impl From<FlavorArg> for RuntimeFlavor {
    fn from(arg: FlavorArg) -> Self {
        match arg {
            FlavorArg::MultiThread => RuntimeFlavor::MultiThread,
            FlavorArg::CurrentThread => RuntimeFlavor::CurrentThread,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unknown scenario: {0} (see `skein list`)")]
    UnknownScenario(String),

    #[error("encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

fn load_config(cli: &Cli) -> Result<SchedulerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_path(path)?,
        None => SchedulerConfig::default(),
    };
    if let Some(flavor) = cli.flavor {
        config.flavor = flavor.into();
    }
    if let Some(workers) = cli.workers {
        config.worker_threads = workers;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<u8, CliError> {
    let config = load_config(&cli)?;
    let registry = scenarios::registry()?;

    match cli.command {
        Command::List => {
            for scenario in registry.iter() {
                println!("{:<20} {}", scenario.name(), scenario.about());
            }
            Ok(0)
        }
        Command::Run { scenario } => {
            let scenario = registry
                .get(&scenario)
                .ok_or_else(|| CliError::UnknownScenario(scenario.clone()))?;
            let runtime = config.build_runtime()?;
            let result = runtime.block_on(run_scenario(scenario.as_ref(), &config));
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.exit_code())
        }
        Command::RunAll => {
            let runtime = config.build_runtime()?;
            let mut all_as_expected = true;
            for scenario in registry.iter() {
                let result = runtime.block_on(run_scenario(scenario.as_ref(), &config));
                all_as_expected &= result.as_expected();
                println!("{}", serde_json::to_string(&result)?);
            }
            Ok(if all_as_expected { 0 } else { 2 })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .try_init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
