//! Exclusive per-call gRPC connections.
//!
//! Every broadcast or query opens its own [`Connection`] and drops it before
//! returning. Nothing is cached or shared between calls, so a torn-down
//! connection after a timeout can never leak into a later submission.
//!
//! Dropping the [`Connection`] drops the last handle to the tonic [`Channel`],
//! which closes the underlying HTTP/2 connection. This holds on every exit
//! path, including cancellation of the enclosing future.

use std::time::Duration;

use snafu::ResultExt;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};

use crate::config::{EndpointConfig, TlsConfig};
use crate::error::{InvalidUrlSnafu, Result, TransportSnafu};

/// TCP keepalive interval while a call is in flight.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// A connection owned by exactly one call.
#[derive(Debug)]
pub(crate) struct Connection {
    channel: Channel,
    endpoint: String,
}

impl Connection {
    /// Dials the configured endpoint.
    ///
    /// The dial itself is bounded by the configured timeout; callers also wrap
    /// the whole exchange in the same deadline.
    pub(crate) async fn open(config: &EndpointConfig) -> Result<Self> {
        let endpoint = Endpoint::try_from(config.endpoint().to_owned()).map_err(|e| {
            InvalidUrlSnafu { url: config.endpoint(), message: format!("not a gRPC endpoint: {e}") }
                .build()
        })?;

        let endpoint = configure_endpoint(endpoint, config.timeout());
        let endpoint = match config.tls() {
            Some(tls) => endpoint.tls_config(client_tls_config(tls)).context(TransportSnafu)?,
            None => endpoint,
        };

        tracing::debug!(endpoint = config.endpoint(), tls = config.tls().is_some(), "Dialing");
        let channel = endpoint.connect().await.context(TransportSnafu)?;
        tracing::debug!(endpoint = config.endpoint(), "Connected");

        Ok(Self { channel, endpoint: config.endpoint().to_owned() })
    }

    /// Returns a handle to the channel for building a service client.
    ///
    /// The handle shares this connection; it must not outlive the call.
    pub(crate) fn channel(&self) -> Channel {
        self.channel.clone()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        tracing::debug!(endpoint = %self.endpoint, "Connection closed");
    }
}

/// Applies connection settings to an endpoint.
fn configure_endpoint(endpoint: Endpoint, timeout: Duration) -> Endpoint {
    endpoint
        .connect_timeout(timeout)
        .tcp_nodelay(true)
        .tcp_keepalive(Some(TCP_KEEPALIVE_INTERVAL))
}

fn client_tls_config(tls: &TlsConfig) -> ClientTlsConfig {
    let mut config = ClientTlsConfig::new();
    if let Some(ca) = tls.ca_cert() {
        config = config.ca_certificate(Certificate::from_pem(ca));
    }
    if let (Some(cert), Some(key)) = (tls.client_cert(), tls.client_key()) {
        config = config.identity(Identity::from_pem(cert, key));
    }
    if let Some(domain) = tls.domain_name() {
        config = config.domain_name(domain);
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use fxconfig_test_utils::fixtures;

    use super::*;
    use crate::Error;
    use crate::mock::MockOrderer;

    #[tokio::test]
    async fn test_open_fails_with_unreachable_endpoint() {
        let config = EndpointConfig::builder()
            .with_endpoint("127.0.0.1:1")
            .with_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let err = Connection::open(&config).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "got: {err}");
        assert!(err.outcome_unknown());
    }

    #[test]
    fn test_tls_turns_bare_address_into_https() {
        let config = EndpointConfig::builder()
            .with_endpoint("orderer:7050")
            .with_tls(TlsConfig::new().with_ca_cert_pem(fixtures::SIGNER_CERT_PEM))
            .build()
            .unwrap();
        assert_eq!(config.endpoint(), "https://orderer:7050");

        let plain = EndpointConfig::builder().with_endpoint("orderer:7050").build().unwrap();
        assert_eq!(plain.endpoint(), "http://orderer:7050");
    }

    #[test]
    fn test_client_tls_config_accepts_mutual_material() {
        let tls = mutual_tls();
        assert!(tls.is_mutual());

        let endpoint = Endpoint::from_static("https://orderer.example.com:7050");
        assert!(endpoint.tls_config(client_tls_config(&tls)).is_ok());
    }

    #[tokio::test]
    async fn test_tls_handshake_fails_against_plaintext_server() {
        let server = MockOrderer::start().await.unwrap();

        let plain = EndpointConfig::builder()
            .with_endpoint(server.endpoint())
            .with_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        Connection::open(&plain).await.unwrap();

        let secure = EndpointConfig::builder()
            .with_endpoint(server.endpoint())
            .with_tls(mutual_tls())
            .with_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert!(secure.endpoint().starts_with("https://"));

        let err = Connection::open(&secure).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "got: {err}");

        let mut chain = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push_str(&format!(": {cause}"));
            source = std::error::Error::source(cause);
        }
        assert!(!chain.to_lowercase().contains("refused"), "got: {chain}");
        assert_eq!(server.broadcast_count(), 0);
    }

    fn mutual_tls() -> TlsConfig {
        TlsConfig::new()
            .with_ca_cert_pem(fixtures::SIGNER_CERT_PEM)
            .with_client_cert_pem(fixtures::SIGNER_CERT_PEM, fixtures::SIGNER_PRIVATE_KEY_PEM)
    }
}
