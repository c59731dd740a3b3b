//! Transaction signing and envelope assembly.
//!
//! Signing happens in two layers:
//! 1. Every namespace entry is signed separately over its canonical DER encoding
//!    bound to the transaction id. Signature `i` authenticates entry `i` only.
//! 2. The whole payload (channel header, signature header, transaction bytes) is
//!    signed once more to form the envelope.
//!
//! The transaction id is `hex(sha256(nonce || creator))`, so any change of nonce
//! or creator yields a new id and invalidates every inner signature.

use std::time::SystemTime;

use fxconfig_proto::common::{ChannelHeader, Envelope, Header, HeaderType, Payload, SignatureHeader};
use fxconfig_proto::protoblocktx::Tx;
use prost::Message;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::Span;

use crate::asn1::marshal_tx_namespace;
use crate::error::Result;
use crate::signer::Signer;

/// Size in bytes of the random nonce in the signature header.
pub const NONCE_SIZE: usize = 24;

/// Computes the transaction id for a nonce and serialized creator.
#[must_use]
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

/// Returns a fresh random nonce.
#[must_use]
pub fn new_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// A signed envelope ready for broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    /// Id of the enclosed transaction.
    pub tx_id: String,
    /// The envelope to submit.
    pub envelope: Envelope,
}

/// Signs transactions on behalf of one identity and wraps them in envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeSigner<S> {
    signer: S,
    span: Span,
}

impl<S: Signer> EnvelopeSigner<S> {
    /// Creates a signer that logs under the caller's current span.
    pub fn new(signer: S) -> Self {
        Self { signer, span: Span::current() }
    }

    /// Sets the span events are recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Signs `tx` for `channel` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns the signer's error if serialization or any signature fails, or
    /// [`Error::Encoding`](crate::Error::Encoding) if an entry cannot be encoded.
    /// Nothing is returned on partial failure.
    pub fn sign(&self, tx: Tx, channel: &str) -> Result<SignedEnvelope> {
        self.sign_with_nonce(tx, channel, &new_nonce())
    }

    /// Signs `tx` for `channel` with the given nonce.
    ///
    /// Reusing a nonce reproduces the transaction id, so callers outside tests
    /// should use [`sign`](Self::sign).
    ///
    /// # Errors
    ///
    /// See [`sign`](Self::sign).
    pub fn sign_with_nonce(&self, mut tx: Tx, channel: &str, nonce: &[u8]) -> Result<SignedEnvelope> {
        let _enter = self.span.enter();

        let creator = self.signer.serialize()?;
        let signature_header = SignatureHeader { creator, nonce: nonce.to_vec() };

        tx.id = compute_tx_id(&signature_header.nonce, &signature_header.creator);

        let mut signatures = Vec::with_capacity(tx.namespaces.len());
        for index in 0..tx.namespaces.len() {
            let message = marshal_tx_namespace(&tx, index)?;
            signatures.push(self.signer.sign(&message)?);
        }
        tx.signatures = signatures;

        let channel_header = ChannelHeader {
            r#type: HeaderType::Message as i32,
            version: 0,
            timestamp: Some(prost_types::Timestamp::from(SystemTime::now())),
            channel_id: channel.to_owned(),
            tx_id: tx.id.clone(),
            epoch: 0,
            extension: Vec::new(),
            tls_cert_hash: Vec::new(),
        };

        let payload = Payload {
            header: Some(Header {
                channel_header: channel_header.encode_to_vec(),
                signature_header: signature_header.encode_to_vec(),
            }),
            data: tx.encode_to_vec(),
        };
        let payload_bytes = payload.encode_to_vec();
        let signature = self.signer.sign(&payload_bytes)?;

        tracing::debug!(
            tx_id = %tx.id,
            channel,
            namespaces = tx.namespaces.len(),
            payload_bytes = payload_bytes.len(),
            "Signed transaction envelope"
        );

        Ok(SignedEnvelope { tx_id: tx.id, envelope: Envelope { payload: payload_bytes, signature } })
    }
}
