//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Inspect, validate and watch Tessera service configuration.
#[derive(Parser, Debug)]
#[command(name = "tessera", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, default_value = "text", global = true, env = "TESSERA_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate configuration, then exit.
    Check(CheckArgs),

    /// Print the merged configuration with secrets redacted.
    Show(ShowArgs),

    /// Keep reloading configuration as its files change.
    Watch(WatchArgs),
}

/// Sources shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Configuration file (TOML, JSON or YAML). Repeat to layer files.
    #[arg(
        short,
        long = "config",
        value_name = "PATH",
        env = "TESSERA_CONFIG",
        value_delimiter = ','
    )]
    pub config: Vec<PathBuf>,

    /// Prefix for `PREFIX__SECTION__KEY` environment overrides.
    #[arg(long, default_value = "TESSERA", env = "TESSERA_ENV_PREFIX")]
    pub env_prefix: String,

    /// Ignore environment overrides.
    #[arg(long)]
    pub no_env: bool,

    /// Load a `.env` file from the working directory first.
    #[arg(long)]
    pub dotenv: bool,

    /// Warn about unknown fields instead of failing.
    #[arg(long)]
    pub lenient: bool,

    /// Override a field, e.g. `--set DB.Default.Host=db1`.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,

    /// Give up if loading takes longer than this many seconds.
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub timeout: u64,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration sources.
    #[command(flatten)]
    pub load: LoadArgs,

    /// Treat warnings as failures.
    #[arg(long)]
    pub deny_warnings: bool,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Configuration sources.
    #[command(flatten)]
    pub load: LoadArgs,

    /// Output format.
    #[arg(short, long, default_value = "json")]
    pub format: OutputFormat,

    /// Print which layer supplied each field instead of the values.
    #[arg(long)]
    pub provenance: bool,

    /// Print the merged configuration even if validation would reject it.
    #[arg(long)]
    pub unvalidated: bool,
}

/// Arguments for `watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Configuration sources.
    #[command(flatten)]
    pub load: LoadArgs,

    /// Debounce window for file changes, in milliseconds.
    #[arg(long, default_value_t = 500, value_name = "MS")]
    pub debounce_ms: u64,
}

/// Output format for `show`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// TOML.
    Toml,
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
