//! End-to-end namespace policy deployment.
//!
//! [`deploy_namespace`] runs the full pipeline for one request: validate,
//! pick the verification key, build the policy write, sign it into an envelope
//! and broadcast it. Everything up to the broadcast is local and happens before
//! any connection is opened.

use std::path::Path;

use snafu::ResultExt;
use tracing::Instrument;

use crate::broadcast::{BroadcastClient, BroadcastOutcome};
use crate::config::{MspConfig, NamespaceConfig, OrdererConfig};
use crate::envelope::{EnvelopeSigner, SignedEnvelope};
use crate::error::{IoSnafu, Result};
use crate::key::{extract_verification_key, key_from_identity};
use crate::signer::{MspSigner, Signer};
use crate::tx::{POLICY_SCHEME, build_namespace_tx};
use crate::validation::validate;

/// Result of an accepted deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Id of the submitted transaction.
    pub tx_id: String,
    /// Additional information returned by the ordering service.
    pub info: String,
}

/// Validates `config` and signs the namespace policy transaction.
///
/// The policy key comes from `config.verification_key_path()` when set, and
/// from the signer's own certificate otherwise.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) before touching the signer
/// if the request is invalid, [`Error::Io`](crate::Error::Io) if the key file
/// cannot be read, [`Error::KeyExtraction`](crate::Error::KeyExtraction) if it
/// holds no EC public key, and any error raised by the signer.
pub fn prepare_namespace_envelope<S: Signer>(
    config: &NamespaceConfig,
    signer: S,
) -> Result<SignedEnvelope> {
    validate(config)?;

    let key_pem = match config.verification_key_path() {
        Some(path) => read_key_file(path)?,
        None => key_from_identity(&signer.serialize()?)?,
    };
    let public_key = extract_verification_key(&key_pem)?;

    let tx = build_namespace_tx(POLICY_SCHEME, &public_key, config.namespace_id(), config.version());
    EnvelopeSigner::new(signer).sign(tx, config.channel())
}

/// Deploys the namespace policy described by `config`.
///
/// Exactly one envelope is submitted. A failure is never retried; after a
/// network error the caller has to check the ledger before deploying again.
///
/// # Errors
///
/// Returns the local errors of [`prepare_namespace_envelope`], a network error
/// if the broadcast does not complete (remote outcome unknown), or
/// [`Error::Rejected`](crate::Error::Rejected) if the ordering service refuses
/// the envelope.
pub async fn deploy_namespace<S: Signer>(
    config: &NamespaceConfig,
    orderer: &OrdererConfig,
    signer: S,
) -> Result<Deployment> {
    let span = tracing::info_span!(
        "deploy_namespace",
        channel = config.channel(),
        namespace_id = config.namespace_id(),
        version = config.version(),
    );

    let signed = span.in_scope(|| prepare_namespace_envelope(config, signer))?;
    let client = BroadcastClient::new(orderer.clone()).with_span(span.clone());

    let outcome = client.broadcast(&signed.envelope).instrument(span.clone()).await?;
    let info = match outcome {
        BroadcastOutcome::Success { info } => info,
        // `broadcast` turns every other status into an error.
        BroadcastOutcome::Rejected { info, .. } => info,
    };

    span.in_scope(|| tracing::info!(tx_id = %signed.tx_id, "Namespace policy submitted"));
    Ok(Deployment { tx_id: signed.tx_id, info })
}

/// Deploys with the signing identity stored in a local MSP directory.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) or
/// [`Error::IdentitySetup`](crate::Error::IdentitySetup) if the MSP cannot be
/// loaded, otherwise see [`deploy_namespace`].
pub async fn deploy_namespace_with_msp(
    config: &NamespaceConfig,
    orderer: &OrdererConfig,
    msp: &MspConfig,
) -> Result<Deployment> {
    // Request errors take precedence over identity errors.
    validate(config)?;
    let signer = MspSigner::load(msp)?;
    tracing::debug!(msp_id = signer.msp_id(), "Loaded signing identity");
    deploy_namespace(config, orderer, signer).await
}

fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).context(IoSnafu { path: path.display().to_string() })
}
