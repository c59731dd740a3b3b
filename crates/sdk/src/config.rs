//! Request and connection configuration with builder pattern.
//!
//! Provides type-safe configuration for:
//! - The namespace being deployed ([`NamespaceConfig`])
//! - Connections to the ordering service and the query service ([`EndpointConfig`])
//! - TLS material for those connections ([`TlsConfig`])
//! - The local MSP that signs the transaction ([`MspConfig`])

use std::path::{Path, PathBuf};
use std::time::Duration;

use snafu::{ResultExt, ensure};

use crate::error::{ConfigSnafu, InvalidUrlSnafu, IoSnafu, Result};

/// Default timeout for the whole network phase of a call (3 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Version value meaning "create": no prior version is expected.
pub const CREATE_VERSION: i64 = -1;

/// The namespace to create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Channel the transaction is submitted on.
    pub(crate) channel: String,

    /// Namespace identifier; becomes the key of the meta-namespace write.
    pub(crate) namespace_id: String,

    /// Expected current version, or [`CREATE_VERSION`].
    pub(crate) version: i64,

    /// PEM file holding the endorsement key. When unset the signer's own
    /// certificate is used.
    pub(crate) verification_key_path: Option<PathBuf>,
}

impl NamespaceConfig {
    /// Describes the creation of a new namespace.
    #[must_use]
    pub fn create(channel: impl Into<String>, namespace_id: impl Into<String>) -> Self {
        Self::new(channel, namespace_id, CREATE_VERSION)
    }

    /// Describes an update of a namespace currently stored at `version`.
    #[must_use]
    pub fn update(
        channel: impl Into<String>,
        namespace_id: impl Into<String>,
        version: u64,
    ) -> Self {
        Self::new(channel, namespace_id, i64::try_from(version).unwrap_or(i64::MAX))
    }

    /// Creates a configuration with a raw version value.
    ///
    /// `-1` means create; any value `>= 0` pins the expected version. Values
    /// below `-1` are rejected by [`validate`](crate::validate).
    #[must_use]
    pub fn new(channel: impl Into<String>, namespace_id: impl Into<String>, version: i64) -> Self {
        Self {
            channel: channel.into(),
            namespace_id: namespace_id.into(),
            version,
            verification_key_path: None,
        }
    }

    /// Sets the PEM file to read the endorsement key from.
    #[must_use]
    pub fn with_verification_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.verification_key_path = Some(path.into());
        self
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the namespace identifier.
    #[must_use]
    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    /// Returns the raw version value.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the version the remote ledger must currently hold, if any.
    #[must_use]
    pub fn expected_version(&self) -> Option<u64> {
        u64::try_from(self.version).ok()
    }

    /// Returns the endorsement key path, if set.
    #[must_use]
    pub fn verification_key_path(&self) -> Option<&Path> {
        self.verification_key_path.as_deref()
    }
}

/// Location of the local MSP used to sign transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspConfig {
    /// MSP directory containing `signcerts/` and `keystore/`.
    pub(crate) path: PathBuf,

    /// MSP identifier recorded in the serialized identity.
    pub(crate) msp_id: String,
}

impl MspConfig {
    /// Creates an MSP configuration.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, msp_id: impl Into<String>) -> Self {
        Self { path: path.into(), msp_id: msp_id.into() }
    }

    /// Returns the MSP directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the MSP identifier.
    #[must_use]
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Validates that both fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the path or the MSP id is empty.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.path.as_os_str().is_empty(),
            ConfigSnafu { message: "MSP config path is required" }
        );
        ensure!(!self.msp_id.is_empty(), ConfigSnafu { message: "MSP id is required" });
        Ok(())
    }
}

/// Connection settings for one gRPC endpoint.
///
/// Used for both the ordering service and the query service. Each call opens
/// its own connection from this configuration and closes it before returning.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Normalized endpoint URL (`http://` or `https://`).
    pub(crate) endpoint: String,

    /// Deadline for the whole network phase of a call.
    pub(crate) timeout: Duration,

    /// TLS configuration for secure connections.
    pub(crate) tls: Option<TlsConfig>,
}

impl EndpointConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the network deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the TLS configuration if enabled.
    #[must_use]
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }
}

/// Connection settings for the ordering service.
pub type OrdererConfig = EndpointConfig;

/// Connection settings for the query service.
pub type QueryConfig = EndpointConfig;

/// Builder for [`EndpointConfig`].
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    tls: Option<TlsConfig>,
}

impl EndpointConfigBuilder {
    /// Sets the endpoint.
    ///
    /// Accepts `host:port` or a full `http(s)://host:port` URL. A bare address
    /// gets `https://` when TLS is configured and `http://` otherwise.
    #[must_use]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the deadline for the network phase.
    ///
    /// Default: 3 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the TLS configuration for secure connections.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the TLS configuration if one is given.
    #[must_use]
    pub fn with_optional_tls(mut self, tls: Option<TlsConfig>) -> Self {
        self.tls = tls;
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint is provided
    /// - The endpoint is malformed
    /// - The timeout is zero
    /// - The TLS configuration is inconsistent
    pub fn build(self) -> Result<EndpointConfig> {
        let raw = self
            .endpoint
            .ok_or_else(|| ConfigSnafu { message: "endpoint is required" }.build())?;
        ensure!(!raw.trim().is_empty(), ConfigSnafu { message: "endpoint cannot be empty" });

        let endpoint = normalize_endpoint(raw.trim(), self.tls.is_some())?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        ensure!(!timeout.is_zero(), ConfigSnafu { message: "timeout cannot be zero" });

        if let Some(ref tls) = self.tls {
            tls.validate()?;
        }

        Ok(EndpointConfig { endpoint, timeout, tls: self.tls })
    }
}

/// Adds a scheme to a bare `host:port` address and validates the result.
fn normalize_endpoint(raw: &str, tls: bool) -> Result<String> {
    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else if tls {
        format!("https://{raw}")
    } else {
        format!("http://{raw}")
    };
    validate_url(&url)?;
    Ok(url)
}

/// Validates that a URL is well-formed HTTP(S).
fn validate_url(url: &str) -> Result<()> {
    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://")).unwrap_or("");

    if rest.is_empty() {
        return InvalidUrlSnafu { url, message: "URL must have a host" }.fail();
    }

    if rest.contains(char::is_whitespace) {
        return InvalidUrlSnafu { url, message: "URL cannot contain whitespace" }.fail();
    }

    Ok(())
}

/// TLS configuration for secure connections.
///
/// Holds PEM material in memory. A CA certificate is required to verify the
/// server; a client certificate and key pair enables mutual TLS.
///
/// # Example
///
/// ```no_run
/// # use fxconfig_sdk::TlsConfig;
/// # fn example() -> fxconfig_sdk::Result<()> {
/// // Server verification only
/// let tls = TlsConfig::new().with_ca_cert_pem_file("/path/to/ca.pem")?;
///
/// // Mutual TLS
/// let mtls = TlsConfig::new()
///     .with_ca_cert_pem_file("/path/to/ca.pem")?
///     .with_client_cert_pem_files("/path/to/client.pem", "/path/to/client.key")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// PEM-encoded CA certificate(s) for server verification.
    ca_cert: Option<Vec<u8>>,

    /// PEM-encoded client certificate for mutual TLS.
    client_cert: Option<Vec<u8>>,

    /// PEM-encoded client private key for mutual TLS.
    client_key: Option<Vec<u8>>,

    /// Domain name to verify against the server certificate.
    /// If not set, the hostname from the endpoint URL is used.
    domain_name: Option<String>,
}

impl TlsConfig {
    /// Creates an empty TLS configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a TLS configuration from optional file paths.
    ///
    /// Returns `None` when no path is given, meaning the connection is plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if a file cannot be read, or
    /// [`Error::Config`](crate::Error::Config) if the combination is invalid.
    pub fn from_files(
        ca_cert: Option<&Path>,
        client_cert: Option<&Path>,
        client_key: Option<&Path>,
    ) -> Result<Option<Self>> {
        if ca_cert.is_none() && client_cert.is_none() && client_key.is_none() {
            return Ok(None);
        }

        let mut tls = Self::new();
        if let Some(path) = ca_cert {
            tls.ca_cert = Some(read_file(path)?);
        }
        if let Some(path) = client_cert {
            tls.client_cert = Some(read_file(path)?);
        }
        if let Some(path) = client_key {
            tls.client_key = Some(read_file(path)?);
        }
        tls.validate()?;
        Ok(Some(tls))
    }

    /// Reads the CA certificate from a PEM file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read.
    pub fn with_ca_cert_pem_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.ca_cert = Some(read_file(path.as_ref())?);
        Ok(self)
    }

    /// Sets the CA certificate from PEM bytes.
    #[must_use]
    pub fn with_ca_cert_pem(mut self, pem: impl AsRef<[u8]>) -> Self {
        self.ca_cert = Some(pem.as_ref().to_vec());
        self
    }

    /// Reads the client certificate and key from PEM files for mutual TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if either file cannot be read.
    pub fn with_client_cert_pem_files(
        mut self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        self.client_cert = Some(read_file(cert_path.as_ref())?);
        self.client_key = Some(read_file(key_path.as_ref())?);
        Ok(self)
    }

    /// Sets the client certificate and key from PEM bytes for mutual TLS.
    #[must_use]
    pub fn with_client_cert_pem(mut self, cert: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> Self {
        self.client_cert = Some(cert.as_ref().to_vec());
        self.client_key = Some(key.as_ref().to_vec());
        self
    }

    /// Sets the domain name for server certificate verification.
    #[must_use]
    pub fn with_domain_name(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = Some(domain.into());
        self
    }

    /// Returns the CA certificate PEM if configured.
    #[must_use]
    pub fn ca_cert(&self) -> Option<&[u8]> {
        self.ca_cert.as_deref()
    }

    /// Returns the client certificate PEM if configured.
    #[must_use]
    pub fn client_cert(&self) -> Option<&[u8]> {
        self.client_cert.as_deref()
    }

    /// Returns the client private key PEM if configured.
    #[must_use]
    pub fn client_key(&self) -> Option<&[u8]> {
        self.client_key.as_deref()
    }

    /// Returns the domain name override if configured.
    #[must_use]
    pub fn domain_name(&self) -> Option<&str> {
        self.domain_name.as_deref()
    }

    /// Returns true if a client identity is configured.
    #[must_use]
    pub fn is_mutual(&self) -> bool {
        self.client_cert.is_some() && self.client_key.is_some()
    }

    /// Validates the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Only one of client certificate and key is set
    /// - No CA certificate is configured
    pub fn validate(&self) -> Result<()> {
        if self.client_cert.is_some() && self.client_key.is_none() {
            return ConfigSnafu { message: "client certificate requires a private key" }.fail();
        }
        if self.client_key.is_some() && self.client_cert.is_none() {
            return ConfigSnafu { message: "client private key requires a certificate" }.fail();
        }
        if self.ca_cert.is_none() {
            return ConfigSnafu { message: "TLS requires a CA certificate (--cafile)" }.fail();
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).context(IoSnafu { path: path.display().to_string() })
}
