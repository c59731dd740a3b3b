//! On-disk MSP layouts for identity loading tests.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::Path;

use crate::{TestDir, fixtures};

/// A local MSP directory holding the fixture signing identity.
///
/// ```text
/// <root>/signcerts/cert.pem
/// <root>/keystore/priv_sk
/// ```
///
/// The directory is removed when this value is dropped.
pub struct TestMsp {
    dir: TestDir,
}

impl TestMsp {
    /// Lays out an MSP whose key matches its certificate.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(fixtures::SIGNER_PRIVATE_KEY_PEM)
    }

    /// Lays out an MSP whose only key does not match its certificate.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn with_mismatched_key() -> Self {
        Self::with_key(fixtures::OTHER_PRIVATE_KEY_PEM)
    }

    /// Lays out an MSP with the fixture certificate and the given key.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn with_key(key_pem: &[u8]) -> Self {
        let dir = TestDir::new();
        let signcerts = dir.join("signcerts");
        let keystore = dir.join("keystore");
        std::fs::create_dir_all(&signcerts).expect("create signcerts");
        std::fs::create_dir_all(&keystore).expect("create keystore");
        std::fs::write(signcerts.join("cert.pem"), fixtures::SIGNER_CERT_PEM)
            .expect("write certificate");
        std::fs::write(keystore.join("priv_sk"), key_pem).expect("write key");
        Self { dir }
    }

    /// Returns the MSP root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestMsp {
    fn default() -> Self {
        Self::new()
    }
}
