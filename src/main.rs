use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use backr::config::{Config, ModelSpec};
use backr::coordinator::{Coordinator, RunResult};
use backr::cycler::Cycler;
use backr::stages::{BuiltinRegistry, StageRegistry};

mod cli;

use cli::Cli;
use cli::commands::Commands;

/// Exit code when interrupted with Ctrl-C.
const INTERRUPTED_EXIT: i32 = 130;

/// Log sink that also copies every record to stderr.
struct Tee {
    file: fs::File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.file.write(buf)?;
        let _ = std::io::stderr().write_all(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn setup_logging(verbose: bool, level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("backr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("backr.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .context("Failed to open log file")?;
    let target: Box<dyn Write + Send> = if verbose {
        Box::new(Tee { file })
    } else {
        Box::new(file)
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.parse_env("RUST_LOG");
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Models to act on: the one named with `-m`, or all of them.
fn select_models<'a>(config: &'a Config, only: Option<&'a str>) -> Result<Vec<&'a str>> {
    match only {
        Some(name) if config.model(name).is_none() => {
            eyre::bail!("unknown model `{}`, configured: {}", name, config.model_names().join(", "))
        }
        Some(name) => Ok(vec![name]),
        None => Ok(config.model_names()),
    }
}

fn spec_for(config: &Config, name: &str) -> Result<ModelSpec> {
    let model = config
        .model(name)
        .ok_or_else(|| eyre::eyre!("unknown model `{}`", name))?;
    Ok(ModelSpec::new(name, model.clone(), &config.environment()))
}

fn registry(config: &Config) -> BuiltinRegistry {
    let env = config.environment();
    BuiltinRegistry::new(Arc::new(Cycler::new(env.ledger_dir)))
}

/// Returns the number of failed models.
async fn handle_perform(config: &Config, only: Option<&str>, parallel: bool) -> Result<usize> {
    let names = select_models(config, only)?;
    let coordinator = Coordinator::new(Arc::new(registry(config)));
    let specs = names
        .iter()
        .map(|name| spec_for(config, name))
        .collect::<Result<Vec<_>>>()?;

    info!("perform models={} parallel={}", names.join(","), parallel);

    let results = coordinator.perform_all(&specs, parallel).await;

    let mut failed = 0;
    for (spec, result) in specs.iter().zip(&results) {
        match result {
            RunResult::Success => println!("{} {}", "OK".green().bold(), spec.name),
            RunResult::Failed(reason) => {
                failed += 1;
                println!("{} {}: {}", "FAILED".red().bold(), spec.name, reason);
            }
        }
    }
    Ok(failed)
}

fn handle_check(config: &Config, only: Option<&str>) -> Result<usize> {
    let registry = registry(config);
    let mut failed = 0;

    for name in select_models(config, only)? {
        let spec = spec_for(config, name)?;
        let mut problems: Vec<String> = Vec::new();
        match registry.pipeline(&spec) {
            Ok(pipeline) => info!("check model={} resolved {:?}", name, pipeline),
            Err(e) => problems.push(e.to_string()),
        }
        problems.extend(registry.try_notifiers(&spec).into_iter().filter_map(|r| r.err()).map(|e| e.to_string()));

        if problems.is_empty() {
            println!("{} {}", "OK".green().bold(), name);
        } else {
            failed += 1;
            println!("{} {}", "INVALID".red().bold(), name);
            for problem in problems {
                println!("  {}", problem);
            }
        }
    }
    Ok(failed)
}

async fn handle_ledger(config: &Config, model: &str) -> Result<usize> {
    select_models(config, Some(model))?;
    let cycler = registry(config).cycler().clone();
    let packages = cycler
        .packages(model)
        .await
        .context(format!("Failed to read ledger for {}", model))?;

    if packages.is_empty() {
        println!("{}", format!("No packages recorded for {}", model).yellow());
        return Ok(0);
    }
    println!("{} ({} packages)", model.cyan().bold(), packages.len());
    for package in packages.iter() {
        println!(
            "  {}  {}",
            package.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
            package.file_key
        );
    }
    Ok(0)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<usize> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Perform { model, parallel } => handle_perform(config, model.as_deref(), *parallel).await,
        Commands::Check { model } => handle_check(config, model.as_deref()),
        Commands::Ledger { model } => handle_ledger(config, model).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.is_verbose(), config.log_level.as_deref()).context("Failed to setup logging")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // In-flight runs are dropped before we exit so their workspaces get removed
    let outcome = tokio::select! {
        outcome = run_application(&cli, &config) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(outcome) = outcome else {
        warn!("Interrupted, in-flight runs cancelled");
        eprintln!("{}", "Interrupted".red());
        std::process::exit(INTERRUPTED_EXIT);
    };

    let failed = outcome.context("Application failed")?;
    if failed > 0 {
        eprintln!("{}", format!("{} model(s) failed", failed).red());
        std::process::exit(1);
    }

    Ok(())
}
