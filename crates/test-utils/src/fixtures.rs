//! PEM fixtures for a P-256 signing identity.
//!
//! The signer key pair, its self-signed certificate and its public key belong
//! together. The "other" pair is unrelated to the signer; the RSA key is there
//! to check that non-EC material is ignored.

/// PKCS#8 private key of the signer.
pub const SIGNER_PRIVATE_KEY_PEM: &[u8] = include_bytes!("../fixtures/signer_sk.pem");

/// The signer's private key in SEC1 (`EC PRIVATE KEY`) form.
pub const SIGNER_PRIVATE_KEY_SEC1_PEM: &[u8] = include_bytes!("../fixtures/signer_sk_sec1.pem");

/// Self-signed certificate for the signer key.
pub const SIGNER_CERT_PEM: &[u8] = include_bytes!("../fixtures/signer_cert.pem");

/// The signer's `PUBLIC KEY` block, as re-encoded from its certificate.
pub const SIGNER_PUBLIC_KEY_PEM: &[u8] = include_bytes!("../fixtures/signer_pk.pem");

/// PKCS#8 private key unrelated to the signer.
pub const OTHER_PRIVATE_KEY_PEM: &[u8] = include_bytes!("../fixtures/other_sk.pem");

/// Public key matching [`OTHER_PRIVATE_KEY_PEM`].
pub const OTHER_PUBLIC_KEY_PEM: &[u8] = include_bytes!("../fixtures/other_pk.pem");

/// An RSA `PUBLIC KEY` block.
pub const RSA_PUBLIC_KEY_PEM: &[u8] = include_bytes!("../fixtures/rsa_pk.pem");
