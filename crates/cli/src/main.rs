//! fxconfig command-line tool.
//!
//! Creates, updates and lists namespace policies on a Fabric-X network.
//!
//! # Usage
//!
//! ```bash
//! # Create a namespace whose policy is the MSP signing certificate's key
//! fxconfig namespace create token --channel mychannel -o orderer:7050 \
//!     --mspConfigPath ./msp --mspID Org1MSP
//!
//! # Replace the policy of version 0 with a dedicated endorser key
//! fxconfig namespace update token --channel mychannel -o orderer:7050 \
//!     --version 0 --pk ./endorser_pk.pem --mspConfigPath ./msp --mspID Org1MSP
//!
//! # List installed policies
//! fxconfig namespace list --endpoint committer:7001
//!
//! # Environment variables stand in for flags
//! FXCONFIG_CHANNEL=mychannel FXCONFIG_ORDERER=orderer:7050 fxconfig namespace create token
//! ```
//!
//! Command output goes to stdout and logs to stderr. `RUST_LOG` controls the
//! log level (default `warn`).

mod cli;
mod commands;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return commands::parse_exit_code(&err);
        },
    };
    init_logging(cli.log_format);

    let mut stdout = std::io::stdout().lock();
    match commands::run(cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.outcome_unknown() {
                tracing::warn!("The transaction may still be committed; check before retrying");
            }
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        },
    }
}

/// Initializes logging on stderr.
///
/// Supports three formats:
/// - `Text`: Human-readable format
/// - `Json`: JSON structured logging
/// - `Auto`: JSON for non-TTY stderr, text otherwise
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
