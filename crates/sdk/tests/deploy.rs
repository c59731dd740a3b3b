//! End-to-end deployment tests against the mock ordering service.
//!
//! These drive the public API only: request in, envelope on the wire, outcome
//! back. The mock records what it received so the envelope can be opened and
//! checked field by field.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fxconfig_sdk::mock::{MockOrderer, MockQueryService};
use fxconfig_sdk::proto::common::{ChannelHeader, Envelope, HeaderType, Payload, SignatureHeader, Status};
use fxconfig_sdk::proto::msp::SerializedIdentity;
use fxconfig_sdk::proto::protoblocktx::{NamespacePolicy, Tx};
use fxconfig_sdk::{
    EnvelopeSigner, Error, META_NAMESPACE_ID, MspConfig, MspSigner, NamespaceConfig,
    OrdererConfig, POLICY_SCHEME, QueryConfig, Result, Signer, build_namespace_tx, compute_tx_id,
    deploy_namespace, deploy_namespace_with_msp, list_namespaces, marshal_tx_namespace,
};
use fxconfig_test_utils::{TestDir, TestMsp, assert_eventually, fixtures, strategies};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use prost::Message;
use proptest::prelude::*;

/// Wraps the fixture identity and counts every call made to it.
struct CountingSigner {
    inner: MspSigner,
    calls: AtomicUsize,
}

impl CountingSigner {
    fn new() -> Self {
        let inner =
            MspSigner::from_pem("Org1MSP", fixtures::SIGNER_CERT_PEM, fixtures::SIGNER_PRIVATE_KEY_PEM)
                .unwrap();
        Self { inner, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Signer for CountingSigner {
    fn serialize(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.serialize()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(message)
    }
}

struct Opened {
    channel_header: ChannelHeader,
    signature_header: SignatureHeader,
    tx: Tx,
}

fn open(envelope: &Envelope) -> Opened {
    let payload = Payload::decode(envelope.payload.as_slice()).unwrap();
    let header = payload.header.unwrap();
    Opened {
        channel_header: ChannelHeader::decode(header.channel_header.as_slice()).unwrap(),
        signature_header: SignatureHeader::decode(header.signature_header.as_slice()).unwrap(),
        tx: Tx::decode(payload.data.as_slice()).unwrap(),
    }
}

fn verifying_key() -> VerifyingKey {
    VerifyingKey::from_public_key_pem(std::str::from_utf8(fixtures::SIGNER_PUBLIC_KEY_PEM).unwrap())
        .unwrap()
}

fn verifies(message: &[u8], signature: &[u8]) -> bool {
    let signature = Signature::from_der(signature).unwrap();
    verifying_key().verify(message, &signature).is_ok()
}

fn orderer_for(server: &MockOrderer, timeout: Duration) -> OrdererConfig {
    OrdererConfig::builder()
        .with_endpoint(server.endpoint())
        .with_timeout(timeout)
        .build()
        .unwrap()
}

// ============================================
// Scenario A: create
// ============================================

#[tokio::test]
async fn test_create_namespace_end_to_end() {
    let server = MockOrderer::start().await.unwrap();
    let signer = CountingSigner::new();

    let deployment = deploy_namespace(
        &NamespaceConfig::create("mychannel", "token"),
        &orderer_for(&server, Duration::from_secs(3)),
        &signer,
    )
    .await
    .unwrap();

    let received = server.received_envelopes();
    assert_eq!(received.len(), 1);
    let envelope = &received[0];
    let opened = open(envelope);

    // Outer signature covers the exact payload bytes.
    assert!(verifies(&envelope.payload, &envelope.signature));

    // Channel header.
    let header = &opened.channel_header;
    assert_eq!(header.r#type, HeaderType::Message as i32);
    assert_eq!(header.version, 0);
    assert_eq!(header.epoch, 0);
    assert_eq!(header.channel_id, "mychannel");
    assert!(header.timestamp.is_some());
    assert_eq!(header.tx_id, deployment.tx_id);

    // Transaction id derivation.
    let creator = &opened.signature_header.creator;
    assert_eq!(opened.signature_header.nonce.len(), fxconfig_sdk::NONCE_SIZE);
    assert_eq!(opened.tx.id, compute_tx_id(&opened.signature_header.nonce, creator));
    assert_eq!(opened.tx.id, deployment.tx_id);

    let identity = SerializedIdentity::decode(creator.as_slice()).unwrap();
    assert_eq!(identity.mspid, "Org1MSP");

    // One `_meta` entry with one unversioned write.
    assert_eq!(opened.tx.namespaces.len(), 1);
    assert_eq!(opened.tx.signatures.len(), 1);
    let entry = &opened.tx.namespaces[0];
    assert_eq!(entry.ns_id, META_NAMESPACE_ID);
    assert_eq!(entry.ns_version, 0);
    assert_eq!(entry.read_writes.len(), 1);
    let write = &entry.read_writes[0];
    assert_eq!(write.key, b"token");
    assert_eq!(write.version, None);

    let policy = NamespacePolicy::decode(write.value.as_slice()).unwrap();
    assert_eq!(policy.scheme, POLICY_SCHEME);
    assert_eq!(policy.public_key, fixtures::SIGNER_PUBLIC_KEY_PEM);

    // Inner signature covers the DER encoding bound to the tx id.
    let message = marshal_tx_namespace(&opened.tx, 0).unwrap();
    assert!(verifies(&message, &opened.tx.signatures[0]));
}

// ============================================
// Scenario B: update
// ============================================

#[tokio::test]
async fn test_update_namespace_writes_exact_version() {
    let server = MockOrderer::start().await.unwrap();
    let dir = TestDir::new();
    let key_path = dir.write("pk.pem", fixtures::OTHER_PUBLIC_KEY_PEM);

    let config = NamespaceConfig::update("mychannel", "token", 3).with_verification_key_path(key_path);
    deploy_namespace(&config, &orderer_for(&server, Duration::from_secs(3)), CountingSigner::new())
        .await
        .unwrap();

    let opened = open(&server.received_envelopes()[0]);
    let write = &opened.tx.namespaces[0].read_writes[0];
    assert_eq!(write.version, Some(3));

    let policy = NamespacePolicy::decode(write.value.as_slice()).unwrap();
    assert_eq!(policy.public_key, fixtures::OTHER_PUBLIC_KEY_PEM);

    // Still signed by the deploying identity, not the policy key.
    let message = marshal_tx_namespace(&opened.tx, 0).unwrap();
    assert!(verifies(&message, &opened.tx.signatures[0]));
}

// ============================================
// Scenario C: invalid request
// ============================================

#[tokio::test]
async fn test_empty_namespace_id_rejected_before_signer_and_network() {
    let server = MockOrderer::start().await.unwrap();
    let signer = CountingSigner::new();

    let err = deploy_namespace(
        &NamespaceConfig::create("mychannel", ""),
        &orderer_for(&server, Duration::from_secs(3)),
        &signer,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Config { .. }), "got: {err}");
    assert!(err.is_local());
    assert_eq!(signer.calls(), 0);
    assert_eq!(server.broadcast_count(), 0);
    assert!(server.received_envelopes().is_empty());
}

// ============================================
// Scenario D: timeout
// ============================================

#[tokio::test]
async fn test_timeout_is_network_error_and_releases_stream() {
    let server = MockOrderer::start().await.unwrap();
    server.set_delay(Duration::from_secs(10));

    let err = deploy_namespace(
        &NamespaceConfig::create("mychannel", "token"),
        &orderer_for(&server, Duration::from_millis(300)),
        CountingSigner::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "got: {err}");
    assert!(err.outcome_unknown());
    assert!(!err.is_local());

    let released =
        assert_eventually(Duration::from_secs(5), || server.open_streams() == 0).await;
    assert!(released, "server still holds {} open streams", server.open_streams());
}

// ============================================
// Rejections and identity loading
// ============================================

#[tokio::test]
async fn test_rejection_carries_exact_status() {
    let server = MockOrderer::start().await.unwrap();
    server.set_status(Status::Forbidden, "policy mismatch");

    let err = deploy_namespace(
        &NamespaceConfig::update("mychannel", "token", 0),
        &orderer_for(&server, Duration::from_secs(3)),
        CountingSigner::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), Some(Status::Forbidden));
    assert!(!err.outcome_unknown());
    assert_eq!(server.broadcast_count(), 1);
}

#[tokio::test]
async fn test_deploy_with_msp_directory() {
    let server = MockOrderer::start().await.unwrap();
    let msp = TestMsp::new();

    let deployment = deploy_namespace_with_msp(
        &NamespaceConfig::create("mychannel", "token"),
        &orderer_for(&server, Duration::from_secs(3)),
        &MspConfig::new(msp.path(), "Org1MSP"),
    )
    .await
    .unwrap();

    let opened = open(&server.received_envelopes()[0]);
    assert_eq!(opened.tx.id, deployment.tx_id);
}

#[tokio::test]
async fn test_deploy_with_mismatched_msp_key_fails_locally() {
    let server = MockOrderer::start().await.unwrap();
    let msp = TestMsp::with_mismatched_key();

    let err = deploy_namespace_with_msp(
        &NamespaceConfig::create("mychannel", "token"),
        &orderer_for(&server, Duration::from_secs(3)),
        &MspConfig::new(msp.path(), "Org1MSP"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::IdentitySetup { .. }), "got: {err}");
    assert_eq!(server.broadcast_count(), 0);
}

// ============================================
// Listing
// ============================================

#[tokio::test]
async fn test_list_namespaces_against_mock() {
    let server = MockQueryService::start().await.unwrap();
    server.add_policy("token", 4, b"policy".to_vec());

    let config = QueryConfig::builder().with_endpoint(server.endpoint()).build().unwrap();
    let policies = list_namespaces(&config).await.unwrap();

    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].namespace, "token");
    assert_eq!(policies[0].version, 4);
    assert_eq!(server.query_count(), 1);
}

// ============================================
// Properties
// ============================================

fn signer() -> MspSigner {
    MspSigner::from_pem("Org1MSP", fixtures::SIGNER_CERT_PEM, fixtures::SIGNER_PRIVATE_KEY_PEM)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_distinct_nonces_bind_signatures_to_their_own_id(
        (first, second) in strategies::arb_distinct_nonces(),
        namespace_id in strategies::arb_namespace_id(),
        version in strategies::arb_version(),
    ) {
        let envelope_signer = EnvelopeSigner::new(signer());
        let tx = build_namespace_tx(POLICY_SCHEME, fixtures::SIGNER_PUBLIC_KEY_PEM, &namespace_id, version);

        let a = envelope_signer.sign_with_nonce(tx.clone(), "mychannel", &first).unwrap();
        let b = envelope_signer.sign_with_nonce(tx, "mychannel", &second).unwrap();
        prop_assert_ne!(&a.tx_id, &b.tx_id);

        let tx_a = open(&a.envelope).tx;
        let tx_b = open(&b.envelope).tx;
        let message_a = marshal_tx_namespace(&tx_a, 0).unwrap();
        let message_b = marshal_tx_namespace(&tx_b, 0).unwrap();

        prop_assert!(verifies(&message_a, &tx_a.signatures[0]));
        prop_assert!(verifies(&message_b, &tx_b.signatures[0]));
        prop_assert!(!verifies(&message_b, &tx_a.signatures[0]));
        prop_assert!(!verifies(&message_a, &tx_b.signatures[0]));
    }

    #[test]
    fn prop_invalid_ids_never_reach_the_signer(id in strategies::arb_invalid_namespace_id()) {
        let signer = CountingSigner::new();
        let result = fxconfig_sdk::prepare_namespace_envelope(&NamespaceConfig::create("mychannel", id), &signer);
        prop_assert!(matches!(result, Err(Error::Config { .. })), "expected Error::Config, got {:?}", result);
        prop_assert_eq!(signer.calls(), 0);
    }
}
