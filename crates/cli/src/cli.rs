//! Command-line arguments.
//!
//! Flag names follow the Fabric peer CLI (`--cafile`, `--connTimeout`,
//! `--mspConfigPath`), so existing scripts keep working. Most flags can also be
//! set through `FXCONFIG_*` environment variables; flags win.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fxconfig_sdk::{MspConfig, NamespaceConfig, OrdererConfig, QueryConfig, TlsConfig};

/// Manage namespace policies on a Fabric-X network.
#[derive(Parser, Debug)]
#[command(name = "fxconfig", about, long_about = None)]
pub struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Auto, env = "FXCONFIG_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stderr is not a terminal, text otherwise.
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print version information
    Version,

    /// Perform namespace operations
    #[command(subcommand)]
    Namespace(NamespaceCommand),
}

#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    /// Create a namespace
    Create(CreateArgs),

    /// Update the policy of an existing namespace
    Update(UpdateArgs),

    /// List installed namespaces
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Namespace to create
    #[arg(value_name = "NAMESPACE_ID")]
    pub namespace_id: String,

    /// Path to the endorser's public key or certificate [default: the MSP signing certificate]
    #[arg(long)]
    pub pk: Option<PathBuf>,

    #[command(flatten)]
    pub orderer: OrdererArgs,

    #[command(flatten)]
    pub msp: MspArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Namespace to update
    #[arg(value_name = "NAMESPACE_ID")]
    pub namespace_id: String,

    /// Current version of the namespace policy
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub version: i64,

    /// Path to the endorser's public key or certificate [default: the MSP signing certificate]
    #[arg(long)]
    pub pk: Option<PathBuf>,

    #[command(flatten)]
    pub orderer: OrdererArgs,

    #[command(flatten)]
    pub msp: MspArgs,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Committer query service endpoint
    #[arg(long, env = "FXCONFIG_QUERY_ENDPOINT")]
    pub endpoint: String,

    #[command(flatten)]
    pub tls: TlsArgs,
}

/// Ordering service connection flags.
#[derive(Args, Debug)]
pub struct OrdererArgs {
    /// The name of the channel
    #[arg(long, env = "FXCONFIG_CHANNEL")]
    pub channel: Option<String>,

    /// Ordering service endpoint
    #[arg(short = 'o', long, env = "FXCONFIG_ORDERER")]
    pub orderer: Option<String>,

    #[command(flatten)]
    pub tls: TlsArgs,

    /// Timeout for the whole submission
    #[arg(long = "connTimeout", value_parser = humantime::parse_duration, default_value = "3s")]
    pub conn_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct TlsArgs {
    /// Path to file containing PEM-encoded trusted certificate(s)
    #[arg(long)]
    pub cafile: Option<PathBuf>,

    /// Path to file containing PEM-encoded private key for mutual TLS
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Path to file containing PEM-encoded certificate for mutual TLS
    #[arg(long)]
    pub certfile: Option<PathBuf>,
}

/// Signing identity flags.
#[derive(Args, Debug)]
pub struct MspArgs {
    /// The path to the MSP config directory
    #[arg(long = "mspConfigPath", env = "FXCONFIG_MSP_CONFIG_PATH")]
    pub msp_config_path: Option<PathBuf>,

    /// The name of the MSP
    #[arg(long = "mspID", env = "FXCONFIG_MSP_ID")]
    pub msp_id: Option<String>,
}

impl CreateArgs {
    pub fn namespace_config(&self) -> NamespaceConfig {
        let config = NamespaceConfig::create(self.orderer.channel(), &self.namespace_id);
        with_key_path(config, self.pk.as_ref())
    }
}

impl UpdateArgs {
    pub fn namespace_config(&self) -> NamespaceConfig {
        let config = NamespaceConfig::new(self.orderer.channel(), &self.namespace_id, self.version);
        with_key_path(config, self.pk.as_ref())
    }
}

impl ListArgs {
    pub fn query_config(&self) -> fxconfig_sdk::Result<QueryConfig> {
        QueryConfig::builder()
            .with_endpoint(&self.endpoint)
            .with_optional_tls(self.tls.tls_config()?)
            .build()
    }
}

impl OrdererArgs {
    /// Channel name, empty when not given so validation can report it.
    pub fn channel(&self) -> String {
        self.channel.clone().unwrap_or_default()
    }

    pub fn orderer_config(&self) -> fxconfig_sdk::Result<OrdererConfig> {
        OrdererConfig::builder()
            .with_endpoint(self.orderer.clone().unwrap_or_default())
            .with_timeout(self.conn_timeout)
            .with_optional_tls(self.tls.tls_config()?)
            .build()
    }
}

impl TlsArgs {
    fn tls_config(&self) -> fxconfig_sdk::Result<Option<TlsConfig>> {
        TlsConfig::from_files(
            self.cafile.as_deref(),
            self.certfile.as_deref(),
            self.keyfile.as_deref(),
        )
    }
}

impl MspArgs {
    pub fn msp_config(&self) -> MspConfig {
        MspConfig::new(
            self.msp_config_path.clone().unwrap_or_default(),
            self.msp_id.clone().unwrap_or_default(),
        )
    }
}

fn with_key_path(config: NamespaceConfig, pk: Option<&PathBuf>) -> NamespaceConfig {
    match pk {
        Some(path) => config.with_verification_key_path(path),
        None => config,
    }
}
