//! Signing identities.
//!
//! The deployment pipeline only needs two capabilities from an identity: its
//! serialized form (embedded as the transaction creator) and a signature over
//! arbitrary bytes. [`Signer`] captures exactly that; [`MspSigner`] implements
//! it from a local MSP directory.

use std::fs;
use std::path::{Path, PathBuf};

use der::Decode;
use fxconfig_proto::msp::SerializedIdentity;
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};
use p256::{PublicKey, SecretKey};
use pem::{EncodeConfig, LineEnding, Pem};
use prost::Message;
use x509_cert::Certificate;

use crate::config::MspConfig;
use crate::error::{IdentitySetupSnafu, Result, SigningSnafu};

/// A signing identity.
///
/// Implementations must produce signatures that verify against the identity
/// they serialize. The message is passed unhashed; hashing is part of the
/// signature scheme.
pub trait Signer: Send + Sync {
    /// Returns the serialized identity recorded as the transaction creator.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be serialized.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Signs `message`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`](crate::Error::Signing) if signing fails.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn serialize(&self) -> Result<Vec<u8>> {
        (**self).serialize()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(message)
    }
}

impl<T: Signer + ?Sized> Signer for std::sync::Arc<T> {
    fn serialize(&self) -> Result<Vec<u8>> {
        (**self).serialize()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(message)
    }
}

impl<T: Signer + ?Sized> Signer for Box<T> {
    fn serialize(&self) -> Result<Vec<u8>> {
        (**self).serialize()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(message)
    }
}

/// ECDSA P-256 identity loaded from a local MSP directory.
///
/// Expected layout:
///
/// ```text
/// <msp>/signcerts/*.pem   signing certificate (first file in name order)
/// <msp>/keystore/*        private key matching the certificate (PKCS#8 or SEC1 PEM)
/// ```
#[derive(Clone)]
pub struct MspSigner {
    msp_id: String,
    cert_pem: Vec<u8>,
    signing_key: SigningKey,
}

impl std::fmt::Debug for MspSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MspSigner").field("msp_id", &self.msp_id).finish_non_exhaustive()
    }
}

impl MspSigner {
    /// Loads the default signing identity of an MSP directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentitySetup`](crate::Error::IdentitySetup) if the
    /// directory layout is wrong, the certificate is not an EC P-256
    /// certificate, or no key in the keystore matches it.
    pub fn load(config: &MspConfig) -> Result<Self> {
        config.validate()?;

        let signcerts = config.path().join("signcerts");
        let cert_path = list_files(&signcerts)?.into_iter().next().ok_or_else(|| {
            IdentitySetupSnafu { message: format!("no certificate in {}", signcerts.display()) }
                .build()
        })?;

        let cert_der = read_pem_contents(&cert_path, "CERTIFICATE")?;
        let public_key = certificate_public_key(&cert_der, &cert_path)?;

        let keystore = config.path().join("keystore");
        let secret = find_matching_key(&keystore, &public_key)?;

        let cert_pem = pem::encode_config(
            &Pem::new("CERTIFICATE", cert_der),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );

        tracing::debug!(
            msp_id = config.msp_id(),
            cert = %cert_path.display(),
            "Loaded MSP signing identity"
        );

        Ok(Self {
            msp_id: config.msp_id().to_owned(),
            cert_pem: cert_pem.into_bytes(),
            signing_key: SigningKey::from(secret),
        })
    }

    /// Builds a signer from in-memory PEM material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentitySetup`](crate::Error::IdentitySetup) if the
    /// certificate or key cannot be parsed or do not match.
    pub fn from_pem(msp_id: impl Into<String>, cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let cert = pem::parse(cert_pem).map_err(|e| {
            IdentitySetupSnafu { message: format!("invalid certificate PEM: {e}") }.build()
        })?;
        let public_key = certificate_public_key(cert.contents(), Path::new("<memory>"))?;

        let key_text = std::str::from_utf8(key_pem).map_err(|e| {
            IdentitySetupSnafu { message: format!("private key is not UTF-8 PEM: {e}") }.build()
        })?;
        let secret = parse_secret_key(key_text).ok_or_else(|| {
            IdentitySetupSnafu { message: "unsupported private key format" }.build()
        })?;
        if secret.public_key() != public_key {
            return IdentitySetupSnafu { message: "private key does not match certificate" }
                .fail();
        }

        let cert_pem = pem::encode_config(
            &Pem::new("CERTIFICATE", cert.into_contents()),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );

        Ok(Self {
            msp_id: msp_id.into(),
            cert_pem: cert_pem.into_bytes(),
            signing_key: SigningKey::from(secret),
        })
    }

    /// Returns the MSP identifier.
    #[must_use]
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Returns the signing certificate as PEM.
    #[must_use]
    pub fn certificate_pem(&self) -> &[u8] {
        &self.cert_pem
    }
}

impl Signer for MspSigner {
    fn serialize(&self) -> Result<Vec<u8>> {
        let identity =
            SerializedIdentity { mspid: self.msp_id.clone(), id_bytes: self.cert_pem.clone() };
        Ok(identity.encode_to_vec())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| SigningSnafu { message: format!("ECDSA signing failed: {e}") }.build())?;
        // Verifiers reject high-S signatures.
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

/// Lists regular files in `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        IdentitySetupSnafu { message: format!("cannot read {}: {e}", dir.display()) }.build()
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn read_pem_contents(path: &Path, expected_tag: &str) -> Result<Vec<u8>> {
    let data = fs::read(path).map_err(|e| {
        IdentitySetupSnafu { message: format!("cannot read {}: {e}", path.display()) }.build()
    })?;
    let parsed = pem::parse(&data).map_err(|e| {
        IdentitySetupSnafu { message: format!("invalid PEM in {}: {e}", path.display()) }.build()
    })?;
    if parsed.tag() != expected_tag {
        return IdentitySetupSnafu {
            message: format!(
                "{} holds a {} block, expected {expected_tag}",
                path.display(),
                parsed.tag()
            ),
        }
        .fail();
    }
    Ok(parsed.into_contents())
}

fn certificate_public_key(cert_der: &[u8], path: &Path) -> Result<PublicKey> {
    let cert = Certificate::from_der(cert_der).map_err(|e| {
        IdentitySetupSnafu { message: format!("invalid certificate {}: {e}", path.display()) }
            .build()
    })?;
    let spki_der = der::Encode::to_der(&cert.tbs_certificate.subject_public_key_info)
        .map_err(|e| IdentitySetupSnafu { message: format!("invalid public key: {e}") }.build())?;
    PublicKey::from_public_key_der(&spki_der).map_err(|e| {
        IdentitySetupSnafu {
            message: format!("certificate {} is not an EC P-256 certificate: {e}", path.display()),
        }
        .build()
    })
}

fn find_matching_key(keystore: &Path, public_key: &PublicKey) -> Result<SecretKey> {
    for path in list_files(keystore)? {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        match parse_secret_key(&text) {
            Some(secret) if secret.public_key() == *public_key => return Ok(secret),
            Some(_) => tracing::debug!(key = %path.display(), "Key does not match certificate"),
            None => tracing::debug!(key = %path.display(), "Skipping unparsable key file"),
        }
    }

    IdentitySetupSnafu {
        message: format!("no private key in {} matches the signing certificate", keystore.display()),
    }
    .fail()
}

fn parse_secret_key(pem_text: &str) -> Option<SecretKey> {
    SecretKey::from_pkcs8_pem(pem_text).ok().or_else(|| SecretKey::from_sec1_pem(pem_text).ok())
}
