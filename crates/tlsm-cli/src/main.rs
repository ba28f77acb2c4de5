//! TLSM CLI - Trust-based access-control decisions from the command line.
//!
//! `check` evaluates one request against a rule file, `validate` parses a
//! rule file, and `console` drives the control protocol from stdin.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config_bridge;
mod identity;
mod theme;

use commands::{check, console, validate};

/// TLSM - trust-based access-control decision engine
#[derive(Parser)]
#[command(name = "tlsm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (overrides user and system config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary.
    Pretty,
    /// The decision as JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one access request against a rule file
    Check {
        /// Rule file in `policies.conf` format
        #[arg(short, long)]
        rules: PathBuf,

        /// Executable path of the requesting program
        #[arg(short, long)]
        subject: String,

        /// Operation: open, bind, connect, signal or execve
        #[arg(long)]
        op: String,

        /// Object of the operation (path or address)
        #[arg(long, default_value = "")]
        object: String,

        /// Owning uid of the requester (defaults to the current user)
        #[arg(long)]
        uid: Option<u32>,

        /// Seconds to wait for an approver (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Parse a rule file and print its listing
    Validate {
        /// Rule file in `policies.conf` format
        file: PathBuf,
    },

    /// Read control commands from stdin and run them as the current user
    Console {
        /// Rule file to apply before reading commands
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let resolved = tlsm_config::Config::load(cli.config.as_deref())?;
    let config = resolved.config;

    let mut log_config = config_bridge::to_log_config(&config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = tlsm_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
    for path in &resolved.loaded_files {
        tracing::debug!(path = %path, "configuration file loaded");
    }

    match cli.command {
        Commands::Check {
            rules,
            subject,
            op,
            object,
            uid,
            timeout,
            format,
        } => {
            let args = check::CheckArgs {
                rules,
                subject,
                op,
                object,
                uid,
                timeout,
                json: format == OutputFormat::Json,
            };
            check::run_check(&config, args).await
        },
        Commands::Validate { file } => {
            validate::run_validate(&file)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Console { rules } => {
            console::run_console(&config, rules.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        },
    }
}
