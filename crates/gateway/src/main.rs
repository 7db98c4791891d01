//! Tollgate - Multi-tenant API gateway control plane
//!
//! # Usage
//!
//! ```bash
//! # Run the control plane (default)
//! tollgate
//! tollgate --config configs/tollgate.toml
//!
//! # Print the routing table the current tenants produce
//! tollgate routes --config configs/tollgate.toml
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tollgate_config::{Config, LogConfig, LogFormat, LogOutput};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tollgate - Multi-tenant API gateway control plane
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the control plane
    Serve,

    /// Reconcile once and print the routing table as JSON
    Routes(cmd::routes::RoutesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Routes(args)) => {
            // Table goes to stdout, keep logs off it
            let log = LogConfig {
                output: LogOutput::Stderr,
                ..config.log.clone()
            };
            init_logging(&log, cli.log_level.as_deref())?;
            cmd::routes::run(config, args).await
        }
        Some(Command::Serve) | None => {
            init_logging(&config.log, cli.log_level.as_deref())?;
            cmd::serve::run(config, cli.config.as_deref()).await
        }
    }
}

/// Initialize the tracing subscriber for logging
///
/// Level precedence: CLI flag, then config file, then "info".
fn init_logging(log: &LogConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(log.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);

    match (log.format, log.output) {
        (LogFormat::Console, LogOutput::Stdout) => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        (LogFormat::Console, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(fmt::layer().json().with_target(true))
            .init(),
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
