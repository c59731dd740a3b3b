//! Mock gRPC servers for SDK integration testing.
//!
//! Provides controllable stand-ins for the ordering service's broadcast stream
//! and the committer's query service, so the full deployment pipeline can be
//! exercised without a Fabric-X network.
//!
//! # Features
//!
//! - **Envelope capture**: Every envelope the orderer receives is recorded
//! - **Status injection**: Answer broadcasts with any [`Status`]
//! - **Failure injection**: Fail the RPC, delay the answer, or close the stream silently
//! - **Stream tracking**: Count broadcast streams the server still holds open
//!
//! # Example
//!
//! ```no_run
//! use fxconfig_sdk::mock::MockOrderer;
//! use fxconfig_sdk::{BroadcastClient, OrdererConfig};
//!
//! # async fn example() -> fxconfig_sdk::Result<()> {
//! let server = MockOrderer::start().await?;
//! let config = OrdererConfig::builder().with_endpoint(server.endpoint()).build()?;
//! let client = BroadcastClient::new(config);
//! // ... broadcast, then inspect server.received_envelopes()
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::Stream;
use fxconfig_proto::common::{Envelope, Status};
use fxconfig_proto::orderer::BroadcastResponse;
use fxconfig_proto::orderer::atomic_broadcast_server::{AtomicBroadcast, AtomicBroadcastServer};
use fxconfig_proto::protoblocktx::{NamespacePolicies, PolicyItem};
use fxconfig_proto::protoqueryservice::query_service_server::{
    QueryService, QueryServiceServer,
};
use parking_lot::RwLock;
use snafu::ResultExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Streaming};

use crate::error::{IoSnafu, Result};

type ResponseStream =
    Pin<Box<dyn Stream<Item = std::result::Result<BroadcastResponse, tonic::Status>> + Send>>;

/// Binds an ephemeral localhost port.
async fn bind() -> Result<(TcpListener, String)> {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(addr).await.context(IoSnafu { path: addr.to_string() })?;
    let local_addr = listener.local_addr().context(IoSnafu { path: addr.to_string() })?;
    Ok((listener, local_addr.to_string()))
}

/// Shared failure-injection knobs.
#[derive(Debug, Default)]
struct Injection {
    /// RPC error returned instead of handling the call.
    error: RwLock<Option<(Code, String)>>,

    /// Delay before answering (milliseconds).
    delay_ms: AtomicU64,
}

impl Injection {
    fn check_error(&self) -> std::result::Result<(), tonic::Status> {
        match self.error.read().as_ref() {
            Some((code, message)) => Err(tonic::Status::new(*code, message.clone())),
            None => Ok(()),
        }
    }

    async fn maybe_delay(&self) {
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

// =============================================================================
// Ordering service
// =============================================================================

#[derive(Debug)]
struct OrdererState {
    injection: Injection,

    /// Status and info returned for every envelope.
    reply: RwLock<(Status, String)>,

    /// End the stream without answering.
    close_without_reply: AtomicBool,

    /// Every envelope received, in arrival order.
    envelopes: RwLock<Vec<Envelope>>,

    /// Broadcast streams currently held by the server.
    open_streams: AtomicUsize,
}

impl Default for OrdererState {
    fn default() -> Self {
        Self {
            injection: Injection::default(),
            reply: RwLock::new((Status::Success, String::new())),
            close_without_reply: AtomicBool::new(false),
            envelopes: RwLock::new(Vec::new()),
            open_streams: AtomicUsize::new(0),
        }
    }
}

/// Decrements the open-stream count when the server drops a stream.
struct OpenStreamGuard(Arc<OrdererState>);

impl OpenStreamGuard {
    fn new(state: Arc<OrdererState>) -> Self {
        state.open_streams.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for OpenStreamGuard {
    fn drop(&mut self) {
        self.0.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockAtomicBroadcast {
    state: Arc<OrdererState>,
}

#[tonic::async_trait]
impl AtomicBroadcast for MockAtomicBroadcast {
    type BroadcastStream = ResponseStream;

    async fn broadcast(
        &self,
        request: Request<Streaming<Envelope>>,
    ) -> std::result::Result<Response<Self::BroadcastStream>, tonic::Status> {
        self.state.injection.check_error()?;

        let guard = OpenStreamGuard::new(Arc::clone(&self.state));
        let inbound = request.into_inner();

        // One answer per envelope until the client half-closes.
        let responses = futures::stream::unfold(Some((inbound, guard)), |slot| async move {
            let (mut inbound, guard) = slot?;
            let state = Arc::clone(&guard.0);
            match inbound.message().await {
                Ok(Some(envelope)) => {
                    state.envelopes.write().push(envelope);
                    state.injection.maybe_delay().await;
                    if state.close_without_reply.load(Ordering::SeqCst) {
                        return None;
                    }
                    let (status, info) = state.reply.read().clone();
                    let response = BroadcastResponse { status: status as i32, info };
                    Some((Ok(response), Some((inbound, guard))))
                },
                Ok(None) => None,
                Err(status) => Some((Err(status), None)),
            }
        });

        let stream: Self::BroadcastStream = Box::pin(responses);
        Ok(Response::new(stream))
    }
}

/// Mock ordering service.
///
/// Answers every broadcast envelope with a configurable status (default
/// `SUCCESS`). Shuts down when dropped.
pub struct MockOrderer {
    state: Arc<OrdererState>,
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOrderer {
    /// Starts a mock ordering service on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn start() -> Result<Self> {
        let state = Arc::new(OrdererState::default());
        let (listener, endpoint) = bind().await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let service = MockAtomicBroadcast { state: Arc::clone(&state) };
        let incoming = TcpListenerStream::new(listener);
        tokio::spawn(async move {
            let result = Server::builder()
                .add_service(AtomicBroadcastServer::new(service))
                .serve_with_incoming_shutdown(incoming, async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!("Mock orderer error: {}", e);
            }
        });

        Ok(Self { state, endpoint, shutdown_tx: Some(shutdown_tx) })
    }

    /// Returns the `host:port` address of this server.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sets the status and info returned for subsequent envelopes.
    pub fn set_status(&self, status: Status, info: impl Into<String>) {
        *self.state.reply.write() = (status, info.into());
    }

    /// Delays every answer by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.injection.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Ends the stream after reading an envelope, without answering.
    pub fn set_close_without_reply(&self, close: bool) {
        self.state.close_without_reply.store(close, Ordering::SeqCst);
    }

    /// Fails subsequent broadcast calls with an RPC error.
    pub fn inject_error(&self, code: Code, message: impl Into<String>) {
        *self.state.injection.error.write() = Some((code, message.into()));
    }

    /// Returns every envelope received so far.
    #[must_use]
    pub fn received_envelopes(&self) -> Vec<Envelope> {
        self.state.envelopes.read().clone()
    }

    /// Returns the number of envelopes received.
    #[must_use]
    pub fn broadcast_count(&self) -> usize {
        self.state.envelopes.read().len()
    }

    /// Returns the number of broadcast streams the server still holds.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    /// Clears captured envelopes and resets every injection.
    pub fn reset(&self) {
        self.state.envelopes.write().clear();
        *self.state.reply.write() = (Status::Success, String::new());
        *self.state.injection.error.write() = None;
        self.state.injection.delay_ms.store(0, Ordering::SeqCst);
        self.state.close_without_reply.store(false, Ordering::SeqCst);
    }

    /// Shuts down the server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOrderer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Query service
// =============================================================================

#[derive(Debug, Default)]
struct QueryState {
    injection: Injection,
    policies: RwLock<Vec<PolicyItem>>,
    query_count: AtomicUsize,
}

struct MockQuery {
    state: Arc<QueryState>,
}

#[tonic::async_trait]
impl QueryService for MockQuery {
    async fn get_namespace_policies(
        &self,
        _request: Request<()>,
    ) -> std::result::Result<Response<NamespacePolicies>, tonic::Status> {
        self.state.query_count.fetch_add(1, Ordering::SeqCst);
        self.state.injection.maybe_delay().await;
        self.state.injection.check_error()?;
        let policies = self.state.policies.read().clone();
        Ok(Response::new(NamespacePolicies { policies }))
    }
}

/// Mock committer query service serving namespace policies.
pub struct MockQueryService {
    state: Arc<QueryState>,
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockQueryService {
    /// Starts a mock query service on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn start() -> Result<Self> {
        let state = Arc::new(QueryState::default());
        let (listener, endpoint) = bind().await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let service = MockQuery { state: Arc::clone(&state) };
        let incoming = TcpListenerStream::new(listener);
        tokio::spawn(async move {
            let result = Server::builder()
                .add_service(QueryServiceServer::new(service))
                .serve_with_incoming_shutdown(incoming, async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!("Mock query service error: {}", e);
            }
        });

        Ok(Self { state, endpoint, shutdown_tx: Some(shutdown_tx) })
    }

    /// Returns the `host:port` address of this server.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sets the policies returned by the query.
    pub fn set_policies(&self, policies: Vec<PolicyItem>) {
        *self.state.policies.write() = policies;
    }

    /// Adds one installed namespace policy.
    pub fn add_policy(&self, namespace: impl Into<String>, version: u64, policy: impl Into<Vec<u8>>) {
        self.state.policies.write().push(PolicyItem {
            namespace: namespace.into(),
            policy: policy.into(),
            version,
        });
    }

    /// Delays every answer by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.injection.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Fails subsequent queries with an RPC error.
    pub fn inject_error(&self, code: Code, message: impl Into<String>) {
        *self.state.injection.error.write() = Some((code, message.into()));
    }

    /// Returns the number of queries served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.state.query_count.load(Ordering::SeqCst)
    }

    /// Shuts down the server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockQueryService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use fxconfig_proto::orderer::atomic_broadcast_client::AtomicBroadcastClient;
    use fxconfig_proto::protoqueryservice::query_service_client::QueryServiceClient;

    use super::*;

    #[tokio::test]
    async fn test_orderer_starts_on_ephemeral_port() {
        let server = MockOrderer::start().await.unwrap();
        assert!(server.endpoint().starts_with("127.0.0.1:"));
        assert!(!server.endpoint().ends_with(":0"));
        assert_eq!(server.broadcast_count(), 0);
        assert_eq!(server.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_orderer_answers_each_envelope() {
        let server = MockOrderer::start().await.unwrap();
        server.set_status(Status::NotFound, "channel not found");

        let mut client =
            AtomicBroadcastClient::connect(format!("http://{}", server.endpoint())).await.unwrap();
        let envelopes = vec![
            Envelope { payload: b"a".to_vec(), signature: Vec::new() },
            Envelope { payload: b"b".to_vec(), signature: Vec::new() },
        ];
        let mut inbound =
            client.broadcast(tokio_stream::iter(envelopes.clone())).await.unwrap().into_inner();

        for _ in 0..2 {
            let reply = inbound.message().await.unwrap().unwrap();
            assert_eq!(reply.status(), Status::NotFound);
            assert_eq!(reply.info, "channel not found");
        }
        assert!(inbound.message().await.unwrap().is_none());
        assert_eq!(server.received_envelopes(), envelopes);
    }

    #[tokio::test]
    async fn test_orderer_reset() {
        let server = MockOrderer::start().await.unwrap();
        server.set_status(Status::Forbidden, "");
        server.inject_error(Code::Unavailable, "down");
        server.set_delay(Duration::from_millis(10));
        server.reset();

        let mut client =
            AtomicBroadcastClient::connect(format!("http://{}", server.endpoint())).await.unwrap();
        let envelope = Envelope { payload: b"a".to_vec(), signature: Vec::new() };
        let mut inbound =
            client.broadcast(tokio_stream::iter(vec![envelope])).await.unwrap().into_inner();
        assert_eq!(inbound.message().await.unwrap().unwrap().status(), Status::Success);
    }

    #[tokio::test]
    async fn test_query_service_returns_policies() {
        let server = MockQueryService::start().await.unwrap();
        server.add_policy("ns1", 0, vec![0x01, 0x02]);
        server.add_policy("ns2", 4, vec![0xff]);

        let mut client =
            QueryServiceClient::connect(format!("http://{}", server.endpoint())).await.unwrap();
        let policies = client.get_namespace_policies(()).await.unwrap().into_inner().policies;

        assert_eq!(policies.len(), 2);
        assert_eq!(policies[1].namespace, "ns2");
        assert_eq!(policies[1].version, 4);
        assert_eq!(server.query_count(), 1);
    }

    #[tokio::test]
    async fn test_query_service_error_injection() {
        let server = MockQueryService::start().await.unwrap();
        server.inject_error(Code::Unavailable, "committer down");

        let mut client =
            QueryServiceClient::connect(format!("http://{}", server.endpoint())).await.unwrap();
        let status = client.get_namespace_policies(()).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
