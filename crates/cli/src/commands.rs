//! Command execution.

use std::io::Write;
use std::process::ExitCode;

use fxconfig_sdk::{NamespaceConfig, deploy_namespace_with_msp, list_namespaces, print_policies};
use snafu::{ResultExt, Snafu};

use crate::cli::{Command, MspArgs, NamespaceCommand, OrdererArgs};

/// Top-level error type for the binary.
#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("{source}"))]
    Sdk { source: fxconfig_sdk::Error },

    #[snafu(display("failed to write output: {source}"))]
    Output { source: std::io::Error },
}

impl From<fxconfig_sdk::Error> for CliError {
    fn from(source: fxconfig_sdk::Error) -> Self {
        Self::Sdk { source }
    }
}

impl CliError {
    /// Returns true if a submission may have reached the ordering service.
    pub fn outcome_unknown(&self) -> bool {
        match self {
            Self::Sdk { source } => source.outcome_unknown(),
            Self::Output { .. } => false,
        }
    }
}

/// Exit code for an argument parsing outcome.
///
/// Help and version requests succeed. Every usage error exits with 1, like any
/// other failure.
pub fn parse_exit_code(err: &clap::Error) -> ExitCode {
    if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Runs `command`, writing command output to `out`.
pub async fn run(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Version => print_version(out),
        Command::Namespace(NamespaceCommand::Create(args)) => {
            deploy(&args.namespace_config(), &args.orderer, &args.msp, out).await
        },
        Command::Namespace(NamespaceCommand::Update(args)) => {
            deploy(&args.namespace_config(), &args.orderer, &args.msp, out).await
        },
        Command::Namespace(NamespaceCommand::List(args)) => {
            let policies = list_namespaces(&args.query_config()?).await?;
            print_policies(out, &policies).context(OutputSnafu)
        },
    }
}

async fn deploy(
    config: &NamespaceConfig,
    orderer: &OrdererArgs,
    msp: &MspArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    // Report a bad request before complaining about connection flags.
    fxconfig_sdk::validate(config)?;
    let orderer = orderer.orderer_config()?;

    let deployment = deploy_namespace_with_msp(config, &orderer, &msp.msp_config()).await?;
    writeln!(out, "Namespace '{}' submitted (tx {})", config.namespace_id(), deployment.tx_id)
        .context(OutputSnafu)
}

fn print_version(out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "{}", env!("CARGO_PKG_NAME")).context(OutputSnafu)?;
    writeln!(out, " Version: {}", env!("CARGO_PKG_VERSION")).context(OutputSnafu)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use clap::Parser;
    use fxconfig_sdk::mock::{MockOrderer, MockQueryService};
    use fxconfig_test_utils::TestMsp;

    use super::*;
    use crate::cli::Cli;

    async fn run_args(args: &[&str]) -> (Result<(), CliError>, String) {
        let cli = Cli::try_parse_from(std::iter::once("fxconfig").chain(args.iter().copied()))
            .unwrap();
        let mut out = Vec::new();
        let result = run(cli.command, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    fn parse_error(args: &[&str]) -> clap::Error {
        Cli::try_parse_from(std::iter::once("fxconfig").chain(args.iter().copied())).unwrap_err()
    }

    #[test]
    fn test_missing_namespace_id_exits_with_failure() {
        let err = parse_error(&["namespace", "create"]);
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
        assert_eq!(parse_exit_code(&err), ExitCode::FAILURE);
    }

    #[test]
    fn test_bad_version_value_exits_with_failure() {
        let err = parse_error(&["namespace", "update", "ns1", "--channel", "c", "--version", "abc"]);
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert_eq!(parse_exit_code(&err), ExitCode::FAILURE);
    }

    #[test]
    fn test_help_exits_with_success() {
        let err = parse_error(&["namespace", "create", "--help"]);
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
        assert_eq!(parse_exit_code(&err), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_version() {
        let (result, out) = run_args(&["version"]).await;
        result.unwrap();
        assert!(out.starts_with("fxconfig\n Version: "), "got: {out}");
    }

    #[tokio::test]
    async fn test_create_against_mock() {
        let server = MockOrderer::start().await.unwrap();
        let msp = TestMsp::new();
        let msp_path = msp.path().to_str().unwrap();

        let (result, out) = run_args(&[
            "namespace",
            "create",
            "token",
            "--channel",
            "mychannel",
            "--orderer",
            server.endpoint(),
            "--mspConfigPath",
            msp_path,
            "--mspID",
            "Org1MSP",
        ])
        .await;

        result.unwrap();
        assert!(out.starts_with("Namespace 'token' submitted (tx "), "got: {out}");
        assert_eq!(server.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_create_without_channel_fails_before_network() {
        let server = MockOrderer::start().await.unwrap();
        let (result, _) =
            run_args(&["namespace", "create", "token", "--orderer", server.endpoint()]).await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: you must specify a channel name '--channel channelName'");
        assert!(!err.outcome_unknown());
        assert_eq!(server.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_list_against_mock() {
        let server = MockQueryService::start().await.unwrap();
        server.add_policy("token", 2, vec![0xab, 0xcd]);

        let (result, out) =
            run_args(&["namespace", "list", "--endpoint", server.endpoint()]).await;

        result.unwrap();
        assert_eq!(out, "Installed namespaces (1 total):\n0) token: version 2 policy: abcd\n\n");
    }
}
