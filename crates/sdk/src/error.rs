//! Error types for the namespace deployment pipeline.
//!
//! Errors fall into three groups:
//! - **Local errors**: configuration, identity setup, key extraction, signing and
//!   encoding failures. These happen before anything reaches the network.
//! - **Network errors**: connection failures, stream failures and timeouts. The
//!   remote outcome of the submission is unknown when one of these is returned.
//! - **Rejections**: the ordering service answered with a non-success status.
//!
//! Nothing in this crate retries. A caller that wants to try again must rebuild
//! the whole transaction so it gets a fresh nonce and transaction id.

use fxconfig_proto::common::Status;
use snafu::{Location, Snafu};
use tonic::Code;

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Deployment error with context-rich messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Invalid request or client configuration.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// The local MSP could not produce a signing identity.
    #[snafu(display("Identity setup error at {location}: {message}"))]
    IdentitySetup {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// No usable verification key in the supplied PEM material.
    #[snafu(display("Key extraction error: {message}"))]
    KeyExtraction {
        /// Error description.
        message: String,
    },

    /// The signer refused or failed to sign.
    #[snafu(display("Signing error at {location}: {message}"))]
    Signing {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// A message could not be encoded or decoded.
    #[snafu(display("Encoding error: {message}"))]
    Encoding {
        /// Error description.
        message: String,
    },

    /// Endpoint address could not be turned into a gRPC URI.
    #[snafu(display("Invalid endpoint '{url}': {message}"))]
    InvalidUrl {
        /// The invalid endpoint.
        url: String,
        /// Parse error description.
        message: String,
    },

    /// Transport-level error (dial, HTTP/2, TLS).
    #[snafu(display("Transport error at {location}: {source}"))]
    Transport {
        /// Underlying transport error.
        source: tonic::transport::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// gRPC call failed with a status code.
    #[snafu(display("RPC error (code={code:?}): {message}"))]
    Rpc {
        /// gRPC status code.
        code: Code,
        /// Error message from server.
        message: String,
    },

    /// The response stream ended before a status arrived.
    #[snafu(display("Stream closed: {message}"))]
    StreamClosed {
        /// Close reason.
        message: String,
    },

    /// The network phase did not finish within the deadline.
    #[snafu(display("Operation timed out after {duration_ms}ms; remote outcome unknown"))]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The ordering service rejected the envelope.
    #[snafu(display("Broadcast rejected with status {}: {info}", status.as_str_name()))]
    Rejected {
        /// Status returned by the ordering service.
        status: Status,
        /// Additional information supplied by the server.
        info: String,
    },

    /// Reading a local file failed.
    #[snafu(display("I/O error reading {path}: {source}"))]
    Io {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl Error {
    /// Returns true if the remote outcome is unknown.
    ///
    /// Network-class errors may have been raised after the envelope reached the
    /// ordering service. The submission may or may not have been accepted, so
    /// these are never reported as a definite failure.
    #[must_use]
    pub fn outcome_unknown(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rpc { .. } => true,
            Self::StreamClosed { .. } => true,
            Self::Timeout { .. } => true,
            Self::Config { .. } => false,
            Self::IdentitySetup { .. } => false,
            Self::KeyExtraction { .. } => false,
            Self::Signing { .. } => false,
            Self::Encoding { .. } => false,
            Self::InvalidUrl { .. } => false,
            Self::Rejected { .. } => false,
            Self::Io { .. } => false,
        }
    }

    /// Returns true if the error happened before any network activity.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !self.outcome_unknown() && !matches!(self, Self::Rejected { .. })
    }

    /// Returns the ordering service status if this is a rejection.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the gRPC status code if this is an RPC error.
    #[must_use]
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(source: tonic::transport::Error) -> Self {
        Self::Transport { source, location: Location::default() }
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc { code: status.code(), message: status.message().to_owned() }
    }
}
