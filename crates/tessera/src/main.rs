//! Tessera - Entry point
//!
//! Loads a service configuration the same way the service does at startup,
//! so operators can check it, inspect it, or watch it reload.

mod args;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tessera_config::{ConfigError, ConfigLoader, ConfigStore, ConfigWatcher, ReadyConfig};

use crate::args::{CheckArgs, Cli, Commands, LoadArgs, LogFormat, OutputFormat, ShowArgs, WatchArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let default_filter = match verbose {
        0 => "tessera=info,tessera_config=info,warn",
        1 => "tessera=debug,tessera_config=debug,warn",
        _ => "trace",
    };
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into()),
    );

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Check(args) => check(args).await,
        Commands::Show(args) => show(args).await,
        Commands::Watch(args) => watch(args).await,
    }
}

/// Build a loader from command-line sources.
fn build_loader(args: &LoadArgs) -> Result<ConfigLoader, ConfigError> {
    let mut loader = ConfigLoader::new().strict(!args.lenient);
    if args.dotenv {
        loader = loader.with_dotenv()?;
    }
    for path in &args.config {
        loader = loader.with_file(path)?;
    }
    if !args.no_env {
        loader = loader.with_env_prefix(&args.env_prefix);
    }
    Ok(loader.with_overrides(args.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
}

/// Load and validate, printing the report if rejected.
async fn load(args: &LoadArgs) -> anyhow::Result<Option<ReadyConfig>> {
    let limit = Duration::from_secs(args.timeout);
    match build_loader(args)?.load_with_timeout(limit).await {
        Ok(ready) => Ok(Some(ready)),
        Err(ConfigError::Rejected(report)) => {
            eprintln!(
                "configuration rejected ({} fatal, {} warnings):\n{report}",
                report.fatal().count(),
                report.warnings().count()
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn check(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let Some(ready) = load(&args.load).await? else {
        return Ok(ExitCode::FAILURE);
    };

    for warning in ready.warnings() {
        eprintln!("{warning}");
    }
    if args.deny_warnings && !ready.warnings().is_empty() {
        eprintln!("{} warning(s) denied", ready.warnings().len());
        return Ok(ExitCode::FAILURE);
    }

    println!("configuration OK: {} ({})", ready.server.name, ready.server.bind_addr());
    Ok(ExitCode::SUCCESS)
}

async fn show(args: ShowArgs) -> anyhow::Result<ExitCode> {
    let (config, provenance) = if args.unvalidated {
        build_loader(&args.load)?.merge()?.into_parts()
    } else {
        let Some(ready) = load(&args.load).await? else {
            return Ok(ExitCode::FAILURE);
        };
        let provenance = ready.provenance().clone();
        ((*ready.into_shared()).clone(), provenance)
    };

    let output = match (args.provenance, args.format) {
        (true, OutputFormat::Json) => serde_json::to_string_pretty(&provenance)?,
        (true, OutputFormat::Toml) => provenance.to_string(),
        (false, OutputFormat::Json) => config.to_redacted_json()?,
        (false, OutputFormat::Toml) => config.to_redacted_toml()?,
    };
    println!("{}", output.trim_end());
    Ok(ExitCode::SUCCESS)
}

async fn watch(args: WatchArgs) -> anyhow::Result<ExitCode> {
    if args.load.config.is_empty() {
        bail!("watch needs at least one --config file");
    }
    let Some(ready) = load(&args.load).await? else {
        return Ok(ExitCode::FAILURE);
    };
    let store = ConfigStore::new(ready);

    let sources = args.load.clone();
    let mut builder = ConfigWatcher::builder(store.clone(), move || build_loader(&sources))
        .with_debounce(Duration::from_millis(args.debounce_ms));
    for path in &args.load.config {
        builder = builder.watch_path(path)?;
    }
    let mut watcher = builder.build().context("failed to start configuration watcher")?;

    info!(
        files = args.load.config.len(),
        bind_addr = %store.current().server.bind_addr(),
        "watching configuration"
    );

    tokio::select! {
        () = watcher.run() => warn!("configuration watcher stopped unexpectedly"),
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!(generation = store.generation(), "shutting down");
        }
    }
    Ok(ExitCode::SUCCESS)
}
