//! Client SDK for deploying namespace policies to a Fabric-X network.
//!
//! A namespace policy names the key that must endorse writes to a namespace.
//! This crate builds the policy transaction, signs it with a local identity
//! and submits it to the ordering service over the `AtomicBroadcast` stream.
//! It can also list the policies a committer currently has installed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fxconfig_sdk::{MspConfig, NamespaceConfig, OrdererConfig, deploy_namespace_with_msp};
//!
//! # async fn example() -> fxconfig_sdk::Result<()> {
//! let orderer = OrdererConfig::builder().with_endpoint("localhost:7050").build()?;
//! let msp = MspConfig::new("/etc/msp", "Org1MSP");
//!
//! // Create the namespace, then raise its policy from version 0 to 1.
//! deploy_namespace_with_msp(&NamespaceConfig::create("mychannel", "token"), &orderer, &msp)
//!     .await?;
//! deploy_namespace_with_msp(&NamespaceConfig::update("mychannel", "token", 0), &orderer, &msp)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          deploy_namespace / list_namespaces (API)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  validate │ extract_verification_key │ build_namespace_tx   │
//! ├─────────────────────────────────────────────────────────────┤
//! │       EnvelopeSigner (tx id, ASN.1 entry signatures)        │
//! │       Signer trait │ MspSigner (P-256, low-S, DER)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │     BroadcastClient (one stream, one send, one receive)     │
//! │     Per-call Connection │ TLS │ Deadline on the whole call  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is retried. After a network error the outcome of a submission is
//! unknown ([`Error::outcome_unknown`]); check the installed policies before
//! deploying again.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod asn1;
mod broadcast;
mod config;
mod connection;
mod deploy;
mod envelope;
mod error;
mod key;
pub mod mock;
mod query;
mod signer;
mod tx;
mod validation;

pub use asn1::marshal_tx_namespace;
pub use broadcast::{BroadcastClient, BroadcastOutcome, BroadcastPhase};
pub use config::{
    CREATE_VERSION, DEFAULT_TIMEOUT, EndpointConfig, EndpointConfigBuilder, MspConfig,
    NamespaceConfig, OrdererConfig, QueryConfig, TlsConfig,
};
pub use deploy::{
    Deployment, deploy_namespace, deploy_namespace_with_msp, prepare_namespace_envelope,
};
pub use envelope::{EnvelopeSigner, NONCE_SIZE, SignedEnvelope, compute_tx_id, new_nonce};
pub use error::{Error, Result};
pub use key::{PUBLIC_KEY_LABEL, extract_verification_key, key_from_identity};
pub use query::{list_namespaces, print_policies};
pub use signer::{MspSigner, Signer};
pub use tx::{CONFIG_NAMESPACE_ID, META_NAMESPACE_ID, POLICY_SCHEME, build_namespace_tx};
pub use validation::{MAX_NAMESPACE_ID_BYTES, validate, validate_namespace_id};

/// Generated wire types, re-exported for callers that inspect envelopes.
pub use fxconfig_proto as proto;
