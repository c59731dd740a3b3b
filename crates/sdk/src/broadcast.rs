//! One-shot envelope submission to the ordering service.
//!
//! A broadcast opens a connection, opens one `AtomicBroadcast/Broadcast`
//! stream, sends exactly one envelope, reads exactly one response and closes
//! everything. The envelope is queued on the request stream before the call
//! starts, so the phases are:
//!
//! ```text
//! Idle -> Connecting -> Sent -> StreamOpen -> AwaitingStatus -> Closed
//! ```
//!
//! The configured timeout bounds the whole sequence. When it fires the
//! connection is dropped and [`Error::Timeout`](crate::Error::Timeout) is
//! returned; whether the ordering service accepted the envelope is unknown.
//! Nothing is retried. Resending the same envelope reuses its nonce and id, so
//! a caller that wants another attempt must sign a new one.

use fxconfig_proto::common::{Envelope, Status};
use fxconfig_proto::orderer::atomic_broadcast_client::AtomicBroadcastClient;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, Span};

use crate::config::OrdererConfig;
use crate::connection::Connection;
use crate::error::{RejectedSnafu, Result, StreamClosedSnafu, TimeoutSnafu};

/// Progress of a broadcast exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastPhase {
    /// Nothing has happened yet.
    Idle,
    /// Dialing the ordering service.
    Connecting,
    /// The envelope is queued on the request stream.
    Sent,
    /// The ordering service answered the call with response headers.
    StreamOpen,
    /// Waiting for the ordering service to answer.
    AwaitingStatus,
    /// A response arrived or the exchange failed.
    Closed,
}

impl std::fmt::Display for BroadcastPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Sent => "sent",
            Self::StreamOpen => "stream open",
            Self::AwaitingStatus => "awaiting status",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Answer of the ordering service to a broadcast envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The envelope was accepted for ordering.
    Success {
        /// Additional information from the server.
        info: String,
    },
    /// The envelope was refused.
    Rejected {
        /// Status returned by the server.
        status: Status,
        /// Additional information from the server.
        info: String,
    },
}

impl BroadcastOutcome {
    /// Interprets a raw response status.
    #[must_use]
    pub fn from_status(status: Status, info: String) -> Self {
        if status == Status::Success {
            Self::Success { info }
        } else {
            Self::Rejected { status, info }
        }
    }

    /// Returns true if the envelope was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the status reported by the server.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Rejected { status, .. } => *status,
        }
    }

    /// Converts a rejection into [`Error::Rejected`](crate::Error::Rejected).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`](crate::Error::Rejected) for any status other
    /// than `SUCCESS`.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Success { .. } => Ok(self),
            Self::Rejected { status, info } => RejectedSnafu { status, info }.fail(),
        }
    }
}

/// Client for the ordering service's broadcast stream.
#[derive(Debug, Clone)]
pub struct BroadcastClient {
    config: OrdererConfig,
    span: Span,
}

impl BroadcastClient {
    /// Creates a client that logs under the caller's current span.
    ///
    /// No connection is made until [`broadcast`](Self::broadcast).
    #[must_use]
    pub fn new(config: OrdererConfig) -> Self {
        Self { config, span: Span::current() }
    }

    /// Sets the span events are recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &OrdererConfig {
        &self.config
    }

    /// Submits `envelope` and requires a `SUCCESS` answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`](crate::Error::Rejected) with the exact
    /// status if the ordering service refuses the envelope, or a network error
    /// (see [`submit`](Self::submit)).
    pub async fn broadcast(&self, envelope: &Envelope) -> Result<BroadcastOutcome> {
        self.submit(envelope).await?.into_result()
    }

    /// Submits `envelope` and returns the ordering service's answer as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`](crate::Error::Timeout) if the deadline
    /// passes, [`Error::Transport`](crate::Error::Transport) or
    /// [`Error::Rpc`](crate::Error::Rpc) if the connection or stream fails, and
    /// [`Error::StreamClosed`](crate::Error::StreamClosed) if the stream ends
    /// without a response. In all of these cases the remote outcome is unknown.
    pub async fn submit(&self, envelope: &Envelope) -> Result<BroadcastOutcome> {
        let timeout = self.config.timeout();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let mut phase = BroadcastPhase::Idle;

        let exchange = self.exchange(envelope, &mut phase).instrument(self.span.clone());
        let result = tokio::time::timeout(timeout, exchange).await;

        let _enter = self.span.enter();
        match result {
            Ok(Ok(outcome)) => {
                tracing::info!(
                    endpoint = self.config.endpoint(),
                    status = outcome.status().as_str_name(),
                    "Broadcast answered"
                );
                Ok(outcome)
            },
            Ok(Err(err)) => {
                tracing::warn!(
                    endpoint = self.config.endpoint(),
                    %phase,
                    error = %err,
                    "Broadcast failed; remote outcome unknown"
                );
                Err(err)
            },
            Err(_) => {
                tracing::warn!(
                    endpoint = self.config.endpoint(),
                    %phase,
                    timeout_ms,
                    "Broadcast timed out; remote outcome unknown"
                );
                TimeoutSnafu { duration_ms: timeout_ms }.fail()
            },
        }
    }

    async fn exchange(
        &self,
        envelope: &Envelope,
        phase: &mut BroadcastPhase,
    ) -> Result<BroadcastOutcome> {
        *phase = BroadcastPhase::Connecting;
        let connection = Connection::open(&self.config).await?;
        let mut client = AtomicBroadcastClient::new(connection.channel());

        // The envelope is queued before the stream opens: some servers only
        // send response headers once they have read a message.
        let (sender, receiver) = mpsc::channel(1);
        sender.send(envelope.clone()).await.map_err(|_| {
            StreamClosedSnafu { message: "request stream dropped before send" }.build()
        })?;
        *phase = BroadcastPhase::Sent;

        let response = client.broadcast(ReceiverStream::new(receiver)).await?;
        *phase = BroadcastPhase::StreamOpen;
        tracing::debug!("Broadcast stream open");
        let mut inbound = response.into_inner();

        *phase = BroadcastPhase::AwaitingStatus;
        let reply = inbound.message().await?;

        // Half-close, then release the stream and the connection.
        drop(sender);
        drop(inbound);
        drop(connection);
        *phase = BroadcastPhase::Closed;

        let reply = reply.ok_or_else(|| {
            StreamClosedSnafu { message: "ordering service closed the stream without a status" }
                .build()
        })?;

        let outcome = BroadcastOutcome::from_status(reply.status(), reply.info);
        tracing::debug!(status = outcome.status().as_str_name(), "Broadcast response received");
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Error;
    use crate::mock::MockOrderer;

    fn envelope() -> Envelope {
        Envelope { payload: b"payload".to_vec(), signature: b"sig".to_vec() }
    }

    fn client_for(server: &MockOrderer, timeout: Duration) -> BroadcastClient {
        let config = OrdererConfig::builder()
            .with_endpoint(server.endpoint())
            .with_timeout(timeout)
            .build()
            .unwrap();
        BroadcastClient::new(config)
    }

    #[test]
    fn test_outcome_from_status() {
        assert!(BroadcastOutcome::from_status(Status::Success, String::new()).is_success());
        let rejected = BroadcastOutcome::from_status(Status::Forbidden, "no".to_owned());
        assert!(!rejected.is_success());
        assert_eq!(rejected.status(), Status::Forbidden);
    }

    #[test]
    fn test_into_result_rejects_every_non_success_status() {
        for status in [
            Status::Unknown,
            Status::BadRequest,
            Status::Forbidden,
            Status::NotFound,
            Status::RequestEntityTooLarge,
            Status::InternalServerError,
            Status::NotImplemented,
            Status::ServiceUnavailable,
        ] {
            let err = BroadcastOutcome::from_status(status, String::new()).into_result().unwrap_err();
            assert_eq!(err.status(), Some(status));
            assert!(!err.outcome_unknown());
        }
    }

    #[tokio::test]
    async fn test_broadcast_success() {
        let server = MockOrderer::start().await.unwrap();
        let client = client_for(&server, Duration::from_secs(3));

        let outcome = client.broadcast(&envelope()).await.unwrap();
        assert!(outcome.is_success());

        let received = server.received_envelopes();
        assert_eq!(received, vec![envelope()]);
        assert_eq!(server.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_rejected_with_exact_status() {
        let server = MockOrderer::start().await.unwrap();
        server.set_status(Status::BadRequest, "invalid signature");
        let client = client_for(&server, Duration::from_secs(3));

        let err = client.broadcast(&envelope()).await.unwrap_err();
        match err {
            Error::Rejected { status, info } => {
                assert_eq!(status, Status::BadRequest);
                assert_eq!(info, "invalid signature");
            },
            other => panic!("expected Rejected, got {other}"),
        }
        assert_eq!(server.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_returns_rejection_without_error() {
        let server = MockOrderer::start().await.unwrap();
        server.set_status(Status::ServiceUnavailable, "");
        let client = client_for(&server, Duration::from_secs(3));

        let outcome = client.submit(&envelope()).await.unwrap();
        assert_eq!(outcome.status(), Status::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_broadcast_timeout_closes_connection() {
        let server = MockOrderer::start().await.unwrap();
        server.set_delay(Duration::from_secs(5));
        let client = client_for(&server, Duration::from_millis(200));

        let err = client.broadcast(&envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 200 }), "got: {err}");
        assert!(err.outcome_unknown());
        assert_eq!(err.status(), None);

        let closed = fxconfig_test_utils::assert_eventually(Duration::from_secs(5), || {
            server.open_streams() == 0
        })
        .await;
        assert!(closed, "server still sees an open stream");
    }

    #[tokio::test]
    async fn test_broadcast_stream_closed_without_status() {
        let server = MockOrderer::start().await.unwrap();
        server.set_close_without_reply(true);
        let client = client_for(&server, Duration::from_secs(3));

        let err = client.broadcast(&envelope()).await.unwrap_err();
        assert!(matches!(err, Error::StreamClosed { .. }), "got: {err}");
        assert!(err.outcome_unknown());
    }

    #[tokio::test]
    async fn test_broadcast_rpc_error() {
        let server = MockOrderer::start().await.unwrap();
        server.inject_error(tonic::Code::PermissionDenied, "not a member");
        let client = client_for(&server, Duration::from_secs(3));

        let err = client.broadcast(&envelope()).await.unwrap_err();
        assert_eq!(err.code(), Some(tonic::Code::PermissionDenied));
        assert!(err.outcome_unknown());
    }

    #[tokio::test]
    async fn test_rejected_call_fails_after_envelope_is_queued() {
        let server = MockOrderer::start().await.unwrap();
        server.inject_error(tonic::Code::PermissionDenied, "not a member");
        let client = client_for(&server, Duration::from_secs(3));

        let mut phase = BroadcastPhase::Idle;
        let err = client.exchange(&envelope(), &mut phase).await.unwrap_err();
        assert_eq!(err.code(), Some(tonic::Code::PermissionDenied));
        assert_eq!(phase, BroadcastPhase::Sent);
    }

    #[tokio::test]
    async fn test_slow_answer_times_out_awaiting_status() {
        let server = MockOrderer::start().await.unwrap();
        server.set_delay(Duration::from_secs(5));
        let client = client_for(&server, Duration::from_secs(3));

        let mut phase = BroadcastPhase::Idle;
        let result =
            tokio::time::timeout(Duration::from_millis(300), client.exchange(&envelope(), &mut phase))
                .await;
        assert!(result.is_err());
        assert_eq!(phase, BroadcastPhase::AwaitingStatus);
    }

    #[tokio::test]
    async fn test_answered_exchange_ends_closed() {
        let server = MockOrderer::start().await.unwrap();
        let client = client_for(&server, Duration::from_secs(3));

        let mut phase = BroadcastPhase::Idle;
        client.exchange(&envelope(), &mut phase).await.unwrap();
        assert_eq!(phase, BroadcastPhase::Closed);
    }

    #[tokio::test]
    async fn test_each_broadcast_uses_its_own_connection() {
        let server = MockOrderer::start().await.unwrap();
        let client = client_for(&server, Duration::from_secs(3));

        client.broadcast(&envelope()).await.unwrap();
        client.broadcast(&envelope()).await.unwrap();

        assert_eq!(server.broadcast_count(), 2);
        let closed = fxconfig_test_utils::assert_eventually(Duration::from_secs(5), || {
            server.open_streams() == 0
        })
        .await;
        assert!(closed, "server still sees an open stream");
    }

    #[tokio::test]
    async fn test_unreachable_orderer_is_network_error() {
        let config = OrdererConfig::builder()
            .with_endpoint("127.0.0.1:1")
            .with_timeout(Duration::from_millis(300))
            .build()
            .unwrap();
        let err = BroadcastClient::new(config).broadcast(&envelope()).await.unwrap_err();
        assert!(err.outcome_unknown(), "got: {err}");
    }
}
