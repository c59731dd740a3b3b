//! Verification key extraction from PEM material.
//!
//! The namespace endorsement policy is a `PUBLIC KEY` PEM block. Input may be a
//! bare public key, a certificate, or a bundle with several blocks of either kind
//! mixed with unrelated ones (private keys, CA chains). The first block that
//! yields an EC public key is used; everything after it is ignored.

use der::Decode;
use der::oid::ObjectIdentifier;
use fxconfig_proto::msp::SerializedIdentity;
use pem::{EncodeConfig, LineEnding, Pem};
use prost::Message;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use crate::error::{EncodingSnafu, KeyExtractionSnafu, Result};

/// `id-ecPublicKey` (RFC 5480).
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// PEM label of the re-encoded key.
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Extracts the first EC public key from PEM data and re-encodes it as a
/// `PUBLIC KEY` block.
///
/// Each block is tried as an X.509 certificate, then as a bare
/// SubjectPublicKeyInfo. Blocks that fail to decode are skipped.
///
/// # Errors
///
/// Returns [`Error::KeyExtraction`](crate::Error::KeyExtraction) if no block
/// contains an EC public key.
pub fn extract_verification_key(pem_data: &[u8]) -> Result<Vec<u8>> {
    for (index, parsed) in pem_blocks(pem_data).enumerate() {
        let Some(spki_der) = parse_certificate_or_public_key(parsed.contents()) else {
            tracing::debug!(index, tag = parsed.tag(), "PEM block holds no EC public key");
            continue;
        };

        tracing::debug!(index, tag = parsed.tag(), "Selected verification key");
        let encoded = pem::encode_config(
            &Pem::new(PUBLIC_KEY_LABEL, spki_der),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );
        return Ok(encoded.into_bytes());
    }

    KeyExtractionSnafu { message: "no ECDSA public key in PEM data" }.fail()
}

/// Returns the certificate PEM embedded in a serialized MSP identity.
///
/// Used when no key file is supplied, so the deploying identity becomes the
/// namespace policy.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) if the bytes are not a
/// `SerializedIdentity`.
pub fn key_from_identity(serialized_identity: &[u8]) -> Result<Vec<u8>> {
    let identity = SerializedIdentity::decode(serialized_identity).map_err(|e| {
        EncodingSnafu { message: format!("failed to decode serialized identity: {e}") }.build()
    })?;
    Ok(identity.id_bytes)
}

/// Returns the SubjectPublicKeyInfo DER of a certificate or bare public key, if
/// it holds an EC key.
fn parse_certificate_or_public_key(der_bytes: &[u8]) -> Option<Vec<u8>> {
    let spki = match Certificate::from_der(der_bytes) {
        Ok(cert) => cert.tbs_certificate.subject_public_key_info,
        Err(_) => SubjectPublicKeyInfoOwned::from_der(der_bytes).ok()?,
    };

    if spki.algorithm.oid != EC_PUBLIC_KEY_OID {
        return None;
    }

    der::Encode::to_der(&spki).ok()
}

/// Decodes the PEM blocks found in `data`, in order.
///
/// Text between blocks is dropped. When a block is unterminated or fails to
/// decode, scanning resumes right after its `-----BEGIN` marker, so a broken
/// block never hides a well-formed one that follows it.
fn pem_blocks(data: &[u8]) -> impl Iterator<Item = Pem> + '_ {
    const BEGIN: &[u8] = b"-----BEGIN ";
    const END: &[u8] = b"-----END ";
    const DASHES: &[u8] = b"-----";

    let block_len = |after_begin: &[u8]| {
        let end = find(after_begin, END)?;
        let after_end = end + END.len();
        Some(after_end + find(&after_begin[after_end..], DASHES)? + DASHES.len())
    };

    let mut rest = data;
    std::iter::from_fn(move || {
        loop {
            let start = find(rest, BEGIN)?;
            let after_begin = start + BEGIN.len();
            match block_len(&rest[after_begin..]) {
                Some(len) => match pem::parse(&rest[start..after_begin + len]) {
                    Ok(block) => {
                        rest = &rest[after_begin + len..];
                        return Some(block);
                    },
                    Err(error) => tracing::debug!(%error, "Skipping malformed PEM block"),
                },
                None => tracing::debug!("Skipping unterminated PEM block"),
            }
            rest = &rest[after_begin..];
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
